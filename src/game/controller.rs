//! Game Controller
//!
//! Drives a [`GameSession`] the way a hosting UI does: start once, forward
//! marker placements and timer expiry, accumulate elapsed round time, and
//! post the result when the game ends. The view layer only renders what
//! these methods return.

use std::time::Duration;
use tracing::{info, warn};

use crate::game::highscore::{ranked_rows, RankedRow};
use crate::game::state::{GameError, GamePhase, GameSession};
use crate::network::client::GameBackend;

/// Time a player gets per round.
pub const ROUND_TIME: Duration = Duration::from_secs(30);

/// What the view shows during a round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundView {
    /// 1-based round number.
    pub round: u32,
    /// Screenshot to show.
    pub screenshot_url: String,
    /// Map to guess on.
    pub map_url: String,
}

/// What the view shows after the last round.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalReport {
    /// Sum of round scores.
    pub total_score: u32,
    /// Total time spent guessing, in seconds.
    pub total_time: f64,
    /// Whether the server accepted the highscore.
    pub highscore_posted: bool,
    /// Leaderboard in display order.
    pub leaderboard: Vec<RankedRow>,
}

/// Result of pressing "next".
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Another round started.
    Round(RoundView),
    /// Game finished.
    Finished(FinalReport),
}

/// Per-game UI driver.
pub struct GameController<B> {
    session: GameSession<B>,
    started: bool,
    total_time: Duration,
    finished: Option<FinalReport>,
}

impl<B: GameBackend> GameController<B> {
    /// Wrap a fresh session.
    pub fn new(session: GameSession<B>) -> Self {
        Self {
            session,
            started: false,
            total_time: Duration::ZERO,
            finished: None,
        }
    }

    /// Fetch the game and start the first round.
    ///
    /// Returns `None` if the game was already started.
    pub async fn start(&mut self) -> Result<Option<RoundView>, GameError> {
        if self.started {
            return Ok(None);
        }
        self.started = true;

        self.session.fetch_game_data().await?;
        self.open_round().map(Some)
    }

    /// Forward a map click.
    pub fn place_marker(&mut self, x: f64, y: f64) -> Result<(), GameError> {
        self.session.select_location(x, y)
    }

    /// Player pressed submit.
    pub fn submit(&mut self) -> Result<u32, GameError> {
        self.session.submit_guess()
    }

    /// Round timer ran out.
    pub fn time_expired(&mut self) -> Result<u32, GameError> {
        self.session.submit_guess()
    }

    /// Player pressed "next".
    ///
    /// A round still waiting for a guess is submitted first. On game over the
    /// highscore is posted once; a failed post is logged and the last known
    /// leaderboard is shown instead. Later calls return the same report.
    pub async fn advance(&mut self, round_elapsed: Duration) -> Result<Advance, GameError> {
        if let Some(report) = &self.finished {
            return Ok(Advance::Finished(report.clone()));
        }

        if self.session.phase() == GamePhase::WaitingForGuess {
            self.session.submit_guess()?;
        }
        self.total_time += round_elapsed.min(ROUND_TIME);

        if !self.session.is_game_over() {
            return self.open_round().map(Advance::Round);
        }

        let total_score = self.session.total_score();
        let total_time = self.total_time.as_secs_f64();
        let highscore_posted = match self.session.post_highscore(total_score, total_time).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Couldn't post highscore: {}", e);
                false
            }
        };

        info!("Game finished with {} points in {:.1}s", total_score, total_time);
        let report = FinalReport {
            total_score,
            total_time,
            highscore_posted,
            leaderboard: ranked_rows(self.session.highscores()),
        };
        self.finished = Some(report.clone());
        Ok(Advance::Finished(report))
    }

    /// Underlying session, for read-only inspection.
    pub fn session(&self) -> &GameSession<B> {
        &self.session
    }

    /// Time accumulated over finished rounds.
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    fn open_round(&mut self) -> Result<RoundView, GameError> {
        let screenshot_url = self.session.next_round()?.to_string();
        Ok(RoundView {
            round: self.session.rounds_played() + 1,
            screenshot_url,
            map_url: self.session.map_url().unwrap_or_default().to_string(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::data::Highscore;
    use crate::game::state::tests::{two_shot_game, MockBackend};
    use crate::game::state::SessionConfig;

    fn controller(highscores: Option<Vec<Highscore>>) -> GameController<MockBackend> {
        let mut data = two_shot_game();
        data.highscore_list = vec![Highscore::new("stale", 10, 9.0)];
        let backend = MockBackend {
            data: Some(data),
            highscore_response: highscores,
            ..Default::default()
        };
        let config = SessionConfig {
            rng_seed: Some(3),
            ..Default::default()
        };
        let session = GameSession::with_backend("https://example.com/game/1/data", backend, config).unwrap();
        GameController::new(session)
    }

    #[tokio::test]
    async fn test_start_opens_first_round_once() {
        let mut ui = controller(None);
        let view = ui.start().await.unwrap().unwrap();
        assert_eq!(view.round, 1);
        assert_eq!(view.map_url, "https://example.com/map.png");
        assert!(view.screenshot_url.contains("screenshot"));

        assert_eq!(ui.start().await.unwrap(), None);
        assert_eq!(ui.session().rounds_played(), 0);
    }

    #[tokio::test]
    async fn test_full_game_posts_highscore() {
        let server_list = vec![
            Highscore::new("slow", 500, 20.0),
            Highscore::new("me", 2000, 12.5),
        ];
        let mut ui = controller(Some(server_list));
        ui.start().await.unwrap();

        let answer = ui.session().current_screenshot().unwrap().correct_answer;
        ui.place_marker(answer.x(), answer.y()).unwrap();
        assert_eq!(ui.submit().unwrap(), 1000);

        let view = match ui.advance(Duration::from_millis(5_500)).await.unwrap() {
            Advance::Round(view) => view,
            other => panic!("expected a second round, got {:?}", other),
        };
        assert_eq!(view.round, 2);

        let answer = ui.session().current_screenshot().unwrap().correct_answer;
        ui.place_marker(answer.x(), answer.y()).unwrap();
        ui.submit().unwrap();

        let report = match ui.advance(Duration::from_secs(7)).await.unwrap() {
            Advance::Finished(report) => report,
            other => panic!("expected game over, got {:?}", other),
        };
        assert_eq!(report.total_score, 2000);
        assert!((report.total_time - 12.5).abs() < 1e-9);
        assert!(report.highscore_posted);
        assert_eq!(report.leaderboard[0].username, "me");
        assert_eq!(report.leaderboard[1].rank, 2);
    }

    #[tokio::test]
    async fn test_failed_post_shows_stale_leaderboard() {
        let mut ui = controller(None);
        ui.start().await.unwrap();
        for _ in 0..2 {
            assert_eq!(ui.time_expired().unwrap(), 0);
            if let Advance::Finished(report) = ui.advance(ROUND_TIME).await.unwrap() {
                assert!(!report.highscore_posted);
                assert_eq!(report.total_score, 0);
                assert_eq!(report.leaderboard.len(), 1);
                assert_eq!(report.leaderboard[0].username, "stale");
                return;
            }
        }
        panic!("game never finished");
    }

    #[tokio::test]
    async fn test_advance_without_submit_on_last_round_finishes() {
        let backend = MockBackend {
            data: Some(two_shot_game()),
            highscore_response: Some(vec![Highscore::new("me", 0, 3.0)]),
            ..Default::default()
        };
        let posted = backend.posted.clone();
        let session = GameSession::with_backend("https://example.com/game/1/data", backend, SessionConfig::default()).unwrap();
        let mut ui = GameController::new(session);

        ui.start().await.unwrap();
        ui.time_expired().unwrap();
        assert!(matches!(ui.advance(Duration::from_secs(1)).await.unwrap(), Advance::Round(_)));

        // Last round never submitted; advance scores it
        let report = match ui.advance(Duration::from_secs(2)).await.unwrap() {
            Advance::Finished(report) => report,
            other => panic!("expected game over, got {:?}", other),
        };
        assert!(ui.session().is_game_over());
        assert_eq!(ui.session().rounds_played(), 2);
        assert!(report.highscore_posted);
        assert_eq!(report.total_time, 3.0);
        assert_eq!(posted.lock().unwrap().len(), 1);

        // Pressing next again neither re-posts nor counts time twice
        let again = ui.advance(Duration::from_secs(2)).await.unwrap();
        assert_eq!(again, Advance::Finished(report));
        assert_eq!(ui.total_time(), Duration::from_secs(3));
        assert_eq!(posted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_advance_on_pending_round_moves_on() {
        let mut ui = controller(None);
        ui.start().await.unwrap();
        ui.place_marker(0.5, 0.5).unwrap();
        match ui.advance(Duration::from_secs(4)).await.unwrap() {
            Advance::Round(view) => assert_eq!(view.round, 2),
            other => panic!("expected a second round, got {:?}", other),
        }
        assert_eq!(ui.session().rounds_played(), 1);
        assert!(ui.session().total_score() > 0);
    }

    #[tokio::test]
    async fn test_elapsed_time_capped_at_round_time() {
        let mut ui = controller(None);
        ui.start().await.unwrap();
        ui.time_expired().unwrap();
        ui.advance(Duration::from_secs(90)).await.unwrap();
        assert_eq!(ui.total_time(), ROUND_TIME);
    }
}
