//! Normalized Map Coordinate
//!
//! 2D point in map-image space. Both components are fractions of the map
//! image size, so (0, 0) is the top-left corner and (1, 1) the bottom-right.
//! Values outside [0, 1] are allowed; only non-finite values are rejected.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Rejected coordinate component.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    /// X component is NaN or infinite.
    #[error("x must be a finite number, got {0}")]
    NonFiniteX(f64),
    /// Y component is NaN or infinite.
    #[error("y must be a finite number, got {0}")]
    NonFiniteY(f64),
}

/// Immutable 2D coordinate with finite components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawVec2")]
pub struct Vec2 {
    x: f64,
    y: f64,
}

/// Unchecked wire shape, validated into [`Vec2`].
#[derive(Deserialize)]
struct RawVec2 {
    x: f64,
    y: f64,
}

impl TryFrom<RawVec2> for Vec2 {
    type Error = CoordinateError;

    fn try_from(raw: RawVec2) -> Result<Self, Self::Error> {
        Vec2::new(raw.x, raw.y)
    }
}

impl Vec2 {
    /// Top-left corner of the map.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a coordinate. Fails if either component is not finite.
    pub fn new(x: f64, y: f64) -> Result<Self, CoordinateError> {
        if !x.is_finite() {
            return Err(CoordinateError::NonFiniteX(x));
        }
        if !y.is_finite() {
            return Err(CoordinateError::NonFiniteY(y));
        }
        Ok(Self { x, y })
    }

    /// X component.
    #[inline]
    pub fn x(self) -> f64 {
        self.x
    }

    /// Y component.
    #[inline]
    pub fn y(self) -> f64 {
        self.y
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({:.4}, {:.4})", self.x, self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.x, self.y)
    }
}

// =============================================================================
// TESTS
// =============================================================================
