//! Protocol Messages
//!
//! Request and response bodies of the game server's JSON API. Game documents
//! themselves are `store::GameRecord`; highscore submissions reuse
//! [`HighscoreSubmission`](crate::game::data::HighscoreSubmission).

use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::core::vec2::Vec2;

// =============================================================================
// CLIENT -> SERVER BODIES
// =============================================================================

/// `POST /game`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGameRequest {
    /// Game title.
    pub title: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Map image URL. May be filled in later.
    #[serde(default)]
    pub map_url: String,
}

/// `PUT /game/<id>`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameRequest {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New map image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
}

/// `POST /game/<id>/screenshot`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddScreenshotRequest {
    /// Image URL.
    pub url: String,
    /// Where on the map the screenshot was taken.
    pub correct_answer: Vec2,
}

/// `PUT /game/<id>/screenshot/<sid>`: drag a screenshot's marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveScreenshotRequest {
    /// New location.
    pub correct_answer: Vec2,
}

/// `POST /game/<id>/rating`
///
/// Any JSON number decodes; the range is checked before login.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRequest {
    /// Stars, 1.0..=5.0.
    pub rating: f64,
}

// =============================================================================
// SERVER -> CLIENT BODIES
// =============================================================================

/// Rating summary. `null` until someone rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingResponse {
    /// Mean of all ratings.
    pub average_rating: Option<f64>,
}

/// Id of a newly created game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBody {
    /// New game id.
    pub id: Uuid,
}

/// Plain message, used for errors and deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Human-readable message.
    pub message: String,
}

impl MessageBody {
    /// Build from anything displayable.
    pub fn new(message: impl ToString) -> Self {
        Self { message: message.to_string() }
    }
}

/// Relative link to a game's data, as returned by `GET /game`.
pub fn game_link(id: &Uuid) -> String {
    format!("./{}", id)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateGameRequest = serde_json::from_str(r#"{"title":"Campus"}"#).unwrap();
        assert_eq!(req.title, "Campus");
        assert!(req.description.is_empty());
        assert!(req.map_url.is_empty());
    }

    #[test]
    fn test_update_request_partial() {
        let req: UpdateGameRequest = serde_json::from_str(r#"{"mapUrl":"https://x/map.png"}"#).unwrap();
        assert_eq!(req.map_url.as_deref(), Some("https://x/map.png"));
        assert_eq!(req.title, None);

        let json = serde_json::to_string(&UpdateGameRequest::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_screenshot_request_validates_answer() {
        let ok: AddScreenshotRequest =
            serde_json::from_str(r#"{"url":"a.png","correctAnswer":{"x":0.25,"y":0.75}}"#).unwrap();
        assert_eq!(ok.correct_answer.x(), 0.25);

        let bad = serde_json::from_str::<AddScreenshotRequest>(r#"{"url":"a.png","correctAnswer":{"x":"left","y":0}}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_rating_request_accepts_any_number() {
        let req: RatingRequest = serde_json::from_str(r#"{"rating":-2}"#).unwrap();
        assert_eq!(req.rating, -2.0);
        let req: RatingRequest = serde_json::from_str(r#"{"rating":4.5}"#).unwrap();
        assert_eq!(req.rating, 4.5);
        assert!(serde_json::from_str::<RatingRequest>(r#"{"rating":"five"}"#).is_err());
    }

    #[test]
    fn test_rating_response_wire_name() {
        let json = serde_json::to_string(&RatingResponse { average_rating: Some(4.5) }).unwrap();
        assert_eq!(json, r#"{"averageRating":4.5}"#);
        let json = serde_json::to_string(&RatingResponse { average_rating: None }).unwrap();
        assert_eq!(json, r#"{"averageRating":null}"#);
    }

    #[test]
    fn test_game_link() {
        let id = Uuid::nil();
        assert_eq!(game_link(&id), "./00000000-0000-0000-0000-000000000000");
    }
}
