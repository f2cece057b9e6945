//! Game Data Contract
//!
//! Typed shapes of the JSON exchanged with the game server. The engine only
//! ever sees these types, so anything that decodes is structurally valid:
//! coordinates are finite, scores are non-negative integers.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;

/// One round's target image and its ground-truth location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    /// Server-assigned identifier, if the server sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Image URL shown to the player.
    pub url: String,
    /// Correct location in normalized map coordinates.
    pub correct_answer: Vec2,
}

/// Public part of a user shown on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighscoreUser {
    /// Display name.
    pub username: String,
}

/// A leaderboard entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highscore {
    /// Who played.
    pub user: HighscoreUser,
    /// Total score of the game.
    pub score: u32,
    /// Time spent, in seconds.
    pub time: f64,
}

impl Highscore {
    /// Convenience constructor.
    pub fn new(username: impl Into<String>, score: u32, time: f64) -> Self {
        Self {
            user: HighscoreUser { username: username.into() },
            score,
            time,
        }
    }
}

/// Everything a play session needs, fetched once from the game URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    /// Map image URL.
    #[serde(default)]
    pub map_url: String,
    /// Screenshots in creator order.
    pub screenshots: Vec<Screenshot>,
    /// Current leaderboard.
    #[serde(default)]
    pub highscore_list: Vec<Highscore>,
}

/// Body of a highscore POST.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighscoreSubmission {
    /// Total score.
    pub score: u32,
    /// Elapsed seconds.
    pub time: f64,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_data_decode() {
        let body = r#"{
            "title": "Campus",
            "mapUrl": "https://example.com/map.png",
            "screenshots": [
                {"url": "https://example.com/screenshot1.png", "correctAnswer": {"x": 0.1, "y": 0.2}},
                {"_id": "x", "url": "./screenshot2.png", "correctAnswer": {"x": 0.3, "y": 0.4}}
            ],
            "highscoreList": [
                {"_id": "1", "user": {"username": "admin", "id": "u1"}, "score": 3000, "time": 10.098}
            ],
            "averageRating": 4.5
        }"#;

        let data: GameData = serde_json::from_str(body).unwrap();
        assert_eq!(data.map_url, "https://example.com/map.png");
        assert_eq!(data.screenshots.len(), 2);
        assert_eq!(data.screenshots[1].correct_answer, Vec2::new(0.3, 0.4).unwrap());
        assert_eq!(data.highscore_list, vec![Highscore::new("admin", 3000, 10.098)]);
    }

    #[test]
    fn test_game_data_missing_highscores_defaults_empty() {
        let data: GameData = serde_json::from_str(r#"{"mapUrl": "m.png", "screenshots": []}"#).unwrap();
        assert!(data.highscore_list.is_empty());
        assert!(data.screenshots.is_empty());
    }

    #[test]
    fn test_game_data_rejects_bad_answer() {
        let body = r#"{"mapUrl": "m.png", "screenshots": [{"url": "a.png", "correctAnswer": {"x": null, "y": 0.1}}]}"#;
        assert!(serde_json::from_str::<GameData>(body).is_err());
    }

    #[test]
    fn test_submission_shape() {
        let body = serde_json::to_value(HighscoreSubmission { score: 100, time: 14.433 }).unwrap();
        assert_eq!(body, serde_json::json!({"score": 100, "time": 14.433}));
    }
}
