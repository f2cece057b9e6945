//! Game Server Client
//!
//! The engine reaches the game server only through [`GameBackend`].
//! [`HttpBackend`] is the real implementation; tests plug in-memory ones.

use std::future::Future;
use std::time::Duration;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::game::data::{GameData, Highscore, HighscoreSubmission};

/// Failure talking to the game server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Server answered with a non-success status.
    #[error("server responded with status {0}")]
    Status(u16),
    /// Server answered with an empty or falsy body.
    #[error("server sent no data")]
    EmptyBody,
    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Body was not the expected JSON shape.
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Remote game endpoints.
pub trait GameBackend {
    /// GET the game document at `url`.
    fn fetch_game_data(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<GameData, FetchError>> + Send;

    /// POST a result to the highscore resource `url`, returning the merged list.
    fn post_highscore(
        &self,
        url: &Url,
        submission: HighscoreSubmission,
    ) -> impl Future<Output = Result<Vec<Highscore>, FetchError>> + Send;
}

/// Highscore resource that sits next to a game data URL.
///
/// `https://host/game/<id>/data` becomes `https://host/game/<id>/highscore`.
pub fn highscore_url(game_url: &Url) -> Result<Url, url::ParseError> {
    game_url.join("highscore")
}

/// Decode a JSON body, treating blank and falsy documents as missing data.
pub fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    let trimmed = body.trim();
    if matches!(trimmed, "" | "null" | "false" | "0" | "\"\"") {
        return Err(FetchError::EmptyBody);
    }
    serde_json::from_str(trimmed).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Blocking HTTP client run on tokio's blocking pool.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    agent: ureq::Agent,
    token: Option<String>,
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpBackend {
    /// Create a client without credentials.
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .build();
        Self { agent, token: None }
    }

    /// Attach a bearer token, required for posting highscores.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn get_blocking(agent: &ureq::Agent, url: &Url) -> Result<String, FetchError> {
        let response = agent
            .get(url.as_str())
            .set("Accept", "application/json")
            .call()
            .map_err(map_ureq_error)?;
        response
            .into_string()
            .map_err(|e| FetchError::Transport(e.to_string()))
    }

    fn post_blocking(
        agent: &ureq::Agent,
        url: &Url,
        token: Option<&str>,
        body: &str,
    ) -> Result<String, FetchError> {
        let mut request = agent
            .post(url.as_str())
            .set("Accept", "application/json")
            .set("Content-Type", "application/json");
        if let Some(token) = token {
            request = request.set("Authorization", &format!("Bearer {}", token));
        }
        let response = request.send_string(body).map_err(map_ureq_error)?;
        response
            .into_string()
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

impl GameBackend for HttpBackend {
    fn fetch_game_data(
        &self,
        url: &Url,
    ) -> impl Future<Output = Result<GameData, FetchError>> + Send {
        let agent = self.agent.clone();
        let url = url.clone();
        async move {
            debug!("GET {}", url);
            let body = tokio::task::spawn_blocking(move || Self::get_blocking(&agent, &url))
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))??;
            decode_body(&body)
        }
    }

    fn post_highscore(
        &self,
        url: &Url,
        submission: HighscoreSubmission,
    ) -> impl Future<Output = Result<Vec<Highscore>, FetchError>> + Send {
        let agent = self.agent.clone();
        let token = self.token.clone();
        let url = url.clone();
        async move {
            debug!("POST {} score={} time={}", url, submission.score, submission.time);
            let body = serde_json::to_string(&submission)
                .map_err(|e| FetchError::Decode(e.to_string()))?;
            let response = tokio::task::spawn_blocking(move || {
                Self::post_blocking(&agent, &url, token.as_deref(), &body)
            })
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))??;
            decode_body(&response)
        }
    }
}

fn map_ureq_error(err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::Status(code, _) => FetchError::Status(code),
        ureq::Error::Transport(transport) => FetchError::Transport(transport.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highscore_url() {
        let url = Url::parse("https://example.com/data").unwrap();
        assert_eq!(highscore_url(&url).unwrap().as_str(), "https://example.com/highscore");

        let url = Url::parse("http://localhost:8080/game/abc/data").unwrap();
        assert_eq!(
            highscore_url(&url).unwrap().as_str(),
            "http://localhost:8080/game/abc/highscore"
        );
    }

    #[test]
    fn test_decode_body_falsy() {
        for body in ["", "  ", "null", "false", "0", "\"\""] {
            assert_eq!(decode_body::<GameData>(body), Err(FetchError::EmptyBody), "{:?}", body);
        }
    }

    #[test]
    fn test_decode_body_shape_error() {
        let result = decode_body::<GameData>(r#"{"mapUrl": 3}"#);
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_decode_body_ok() {
        let list: Vec<Highscore> = decode_body(r#"[{"user":{"username":"a"},"score":1,"time":2.5}]"#).unwrap();
        assert_eq!(list, vec![Highscore::new("a", 1, 2.5)]);
    }

    #[tokio::test]
    async fn test_http_backend_unreachable() {
        // Bind then drop a listener to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let backend = HttpBackend::new();
        let url = Url::parse(&format!("http://127.0.0.1:{}/game/x/data", port)).unwrap();
        let result = backend.fetch_game_data(&url).await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }
}
