//! Game Logic Module
//!
//! Everything a player-side session needs.
//!
//! ## Module Structure
//!
//! - `data`: Wire contract for game documents and leaderboards
//! - `score`: Distance-to-points formula
//! - `highscore`: Leaderboard ordering and the per-user merge rule
//! - `state`: Round/score engine and its state machine
//! - `controller`: UI driver around a session

pub mod data;
pub mod score;
pub mod highscore;
pub mod state;
pub mod controller;

// Re-export key types
pub use data::{GameData, Screenshot, Highscore, HighscoreUser, HighscoreSubmission};
pub use score::{score_guess, MAXIMUM_ROUND_SCORE};
pub use highscore::{rank_highscores, ranked_rows, RankedRow, MergeOutcome};
pub use state::{GameSession, GamePhase, GameError, SessionConfig, DEFAULT_MAX_ROUNDS};
pub use controller::{GameController, Advance, RoundView, FinalReport, ROUND_TIME};
