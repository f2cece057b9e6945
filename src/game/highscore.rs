//! Leaderboard Ordering
//!
//! Ranking is always recomputed from the server's list; the sorted form is
//! never stored. The server keeps one entry per user and only replaces it
//! with a strictly better result.

use std::cmp::Ordering;

use crate::game::data::Highscore;

/// Order two results: higher score first, then faster time.
#[inline]
pub fn compare_results(a_score: u32, a_time: f64, b_score: u32, b_time: f64) -> Ordering {
    b_score
        .cmp(&a_score)
        .then_with(|| a_time.total_cmp(&b_time))
}

/// Sort a leaderboard for display. Stable for equal score and time.
pub fn rank_highscores(highscores: &[Highscore]) -> Vec<Highscore> {
    let mut ranked = highscores.to_vec();
    ranked.sort_by(|a, b| compare_results(a.score, a.time, b.score, b.time));
    ranked
}

/// One rendered leaderboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    /// 1-based rank.
    pub rank: usize,
    /// Display name.
    pub username: String,
    /// Score.
    pub score: u32,
    /// Time in seconds.
    pub time: f64,
}

/// Rank a leaderboard into numbered rows.
pub fn ranked_rows(highscores: &[Highscore]) -> Vec<RankedRow> {
    rank_highscores(highscores)
        .into_iter()
        .enumerate()
        .map(|(index, h)| RankedRow {
            rank: index + 1,
            username: h.user.username,
            score: h.score,
            time: h.time,
        })
        .collect()
}

/// What a highscore POST did to the stored list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First result for this user.
    Inserted,
    /// Replaced a worse result.
    Improved,
    /// Existing result was at least as good.
    Unchanged,
}

/// A new result replaces the old one if it scores higher, or scores the same
/// in less time.
#[inline]
pub fn is_improvement(new_score: u32, new_time: f64, old_score: u32, old_time: f64) -> bool {
    new_score > old_score || (new_score == old_score && new_time < old_time)
}

// =============================================================================
// TESTS
// =============================================================================
