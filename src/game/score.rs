//! Round Scoring
//!
//! Exponential decay from distance to points:
//!
//! ```text
//! score = round(1000 * min(e^(-10d) * 1.1, 1))
//! ```
//!
//! The factor saturates at 1 for `d <= ln(1.1) / 10` (about 0.0095), so
//! near-exact hits all score the maximum.

use crate::core::vec2::Vec2;

/// Points awarded for a perfect guess.
pub const MAXIMUM_ROUND_SCORE: u32 = 1000;

/// Decay rate per normalized distance unit.
pub const SCORE_DECAY: f64 = 10.0;

/// Head-room multiplier that widens the max-score zone.
pub const SCORE_BONUS: f64 = 1.1;

/// Score factor in `[0, 1]` for a given distance.
#[inline]
pub fn score_factor(distance: f64) -> f64 {
    (f64::exp(-SCORE_DECAY * distance) * SCORE_BONUS).min(1.0)
}

/// Points for a guess at `distance` from the correct answer.
pub fn score_for_distance(distance: f64) -> u32 {
    (MAXIMUM_ROUND_SCORE as f64 * score_factor(distance)).round() as u32
}

/// Points for a guess against a correct answer.
pub fn score_guess(guess: Vec2, correct: Vec2) -> u32 {
    score_for_distance(guess.distance(correct))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(x: f64, y: f64) -> Vec2 {
        Vec2::new(x, y).unwrap()
    }

    #[test]
    fn test_exact_hit_scores_max() {
        assert_eq!(score_for_distance(0.0), MAXIMUM_ROUND_SCORE);
        assert_eq!(score_guess(v(0.1, 0.2), v(0.1, 0.2)), 1000);
    }

    #[test]
    fn test_saturation_zone() {
        let edge = SCORE_BONUS.ln() / SCORE_DECAY;
        assert_eq!(score_for_distance(edge * 0.99), 1000);
        assert!(score_for_distance(0.05) < 1000);
    }

    #[test]
    fn test_known_scores() {
        // Guess (0.5, 0.5) against (0.1, 0.2): d = 0.5
        assert_eq!(score_guess(v(0.5, 0.5), v(0.1, 0.2)), 7);
        // Guess (0.5, 0.5) against (0.3, 0.4): d = sqrt(0.05)
        assert_eq!(score_guess(v(0.5, 0.5), v(0.3, 0.4)), 118);
        // Guess (0.1, 0.2) against (0.3, 0.4): d = sqrt(0.08)
        assert_eq!(score_guess(v(0.1, 0.2), v(0.3, 0.4)), 65);
    }

    #[test]
    fn test_far_guess_scores_zero() {
        assert_eq!(score_for_distance(2.0), 0);
        assert_eq!(score_for_distance(f64::INFINITY), 0);
    }

    proptest! {
        #[test]
        fn prop_distance_zero_is_max(x in -10.0f64..10.0, y in -10.0f64..10.0) {
            prop_assert_eq!(score_guess(v(x, y), v(x, y)), MAXIMUM_ROUND_SCORE);
        }

        #[test]
        fn prop_score_non_increasing(d1 in 0.0f64..3.0, delta in 0.0f64..3.0) {
            let d2 = d1 + delta;
            prop_assert!(score_for_distance(d1) >= score_for_distance(d2));
        }

        #[test]
        fn prop_score_bounded(d in 0.0f64..100.0) {
            prop_assert!(score_for_distance(d) <= MAXIMUM_ROUND_SCORE);
        }
    }
}
