//! Core primitives.
//!
//! Value types shared by the game engine and the server.

pub mod vec2;

// Re-export core types
pub use vec2::{Vec2, CoordinateError};
