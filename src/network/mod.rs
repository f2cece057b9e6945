//! Network Layer
//!
//! HTTP on both sides: the player-side backend the engine fetches through,
//! and the JSON server that stores games.
//! This layer does I/O; scoring and round logic stay in `game/`.

pub mod auth;
pub mod protocol;
pub mod client;
pub mod store;
pub mod server;

pub use auth::{AuthConfig, TokenClaims, AuthError, UserId, UserRef, validate_token, issue_token};
pub use client::{GameBackend, HttpBackend, FetchError, highscore_url};
pub use store::{GameStore, GameRecord, GamePage, StoreError, SeedGame};
pub use server::{GameServer, ServerConfig, GameServerError, handle_request, ApiRequest, ApiResponse};
