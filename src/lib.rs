//! # GeoCreator
//!
//! Map-guessing game: a creator uploads a map image and places screenshots at
//! their true locations; players see each screenshot and click where on the
//! map they think it was taken.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        GEOCREATOR                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Value types                               │
//! │  └── vec2.rs     - Normalized map coordinate                 │
//! │                                                              │
//! │  game/           - Player-side engine                        │
//! │  ├── data.rs     - Game data and highscore wire types        │
//! │  ├── score.rs    - Distance to points                        │
//! │  ├── highscore.rs- Leaderboard ordering and merge rule       │
//! │  ├── state.rs    - Round/score engine and state machine      │
//! │  └── controller.rs - UI driver (timer, game-over flow)       │
//! │                                                              │
//! │  network/        - HTTP                                      │
//! │  ├── client.rs   - GameBackend trait, ureq backend           │
//! │  ├── auth.rs     - JWT validation, user identity             │
//! │  ├── protocol.rs - Request/response bodies                   │
//! │  ├── store.rs    - In-memory games, highscores, ratings      │
//! │  └── server.rs   - tiny_http server and router               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Game Flow
//!
//! ```text
//! NOT_STARTED --fetch--> WAITING_FOR_NEXT_ROUND --next_round--> WAITING_FOR_GUESS
//!                              ^                                     |
//!                              +------------submit_guess-------------+
//!                                                                    |
//!                        GAME_OVER <--submit_guess (last round)------+
//! ```
//!
//! A game has at most [`DEFAULT_MAX_ROUNDS`] rounds unless configured
//! otherwise; each round scores up to [`MAXIMUM_ROUND_SCORE`] points.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::vec2::{Vec2, CoordinateError};
pub use game::score::MAXIMUM_ROUND_SCORE;
pub use game::state::{GameSession, GamePhase, GameError, SessionConfig, DEFAULT_MAX_ROUNDS};
pub use game::controller::{GameController, ROUND_TIME};
pub use network::client::{GameBackend, HttpBackend};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
