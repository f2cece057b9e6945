//! HTTP Game Server
//!
//! JSON API over `tiny_http`, driven from the tokio runtime.
//! Handles authentication, game editing, highscores and ratings.
//!
//! The routing itself is [`handle_request`], a plain async function of the
//! store and the request parts, so it is tested without sockets.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::game::data::HighscoreSubmission;
use crate::game::highscore::MergeOutcome;
use crate::network::auth::{bearer_token, validate_token, AuthConfig, AuthError, TokenClaims};
use crate::network::protocol::{
    game_link, AddScreenshotRequest, CreateGameRequest, CreatedBody, MessageBody,
    MoveScreenshotRequest, RatingRequest, RatingResponse, UpdateGameRequest,
};
use crate::network::store::{validate_rating, GameStore, SeedGame, StoreError};

/// How long the accept loop blocks before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// JSON file of games to load at startup.
    pub seed_file: Option<PathBuf>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_body_bytes: 64 * 1024,
            seed_file: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("GEOCREATOR_BIND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            max_body_bytes: std::env::var("GEOCREATOR_MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_body_bytes),
            seed_file: std::env::var("GEOCREATOR_SEED_FILE").ok().map(PathBuf::from),
            ..defaults
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Seed file could not be parsed.
    #[error("Invalid seed file: {0}")]
    Seed(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// ROUTING
// =============================================================================

/// The parts of an HTTP request the router looks at.
#[derive(Debug, Clone, Copy)]
pub struct ApiRequest<'a> {
    /// HTTP method, upper case.
    pub method: &'a str,
    /// Request path, query string allowed.
    pub path: &'a str,
    /// Raw body.
    pub body: &'a str,
    /// `Authorization` header value.
    pub authorization: Option<&'a str>,
}

/// Status and JSON body to send back.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: serde_json::Value,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, body: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(Self { status, body })
    }

    fn ok<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        Self::json(200, body)
    }

    fn created<T: Serialize>(body: &T) -> Result<Self, ApiError> {
        Self::json(201, body)
    }
}

/// Request failures, each with its HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Missing or invalid token.
    #[error("Unauthorized: {0}")]
    Unauthorized(AuthError),
    /// Logged-in user required.
    #[error("You must be logged in: {0}")]
    Forbidden(AuthError),
    /// Body did not parse.
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// Body over the size limit.
    #[error("Request body too large")]
    PayloadTooLarge,
    /// Unknown route or id.
    #[error("Not found")]
    NotFound,
    /// Known route, wrong method.
    #[error("Method not allowed")]
    MethodNotAllowed,
    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Store(e) => e.status_code(),
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::BadRequest(_) => 400,
            ApiError::PayloadTooLarge => 413,
            ApiError::NotFound => 404,
            ApiError::MethodNotAllowed => 405,
            ApiError::Internal(_) => 500,
        }
    }

    fn into_response(self) -> ApiResponse {
        let status = self.status_code();
        if status >= 500 {
            error!("Request failed: {}", self);
        }
        ApiResponse {
            status,
            body: serde_json::json!({ "message": self.to_string() }),
        }
    }
}

/// Resource addressed by a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Games,
    GameData(Uuid),
    Game(Uuid),
    Screenshots(Uuid),
    Screenshot(Uuid, Uuid),
    Highscores(Uuid),
    Rating(Uuid),
}

/// Whether the query string carries `key`, with or without a value.
fn has_query_flag(path: &str, key: &str) -> bool {
    let Some((_, query)) = path.split_once('?') else {
        return false;
    };
    url::form_urlencoded::parse(query.as_bytes()).any(|(name, _)| name == key)
}

impl Route {
    fn parse(path: &str) -> Result<Self, ApiError> {
        let path = path.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            ["game"] => Ok(Route::Games),
            ["game", game] => Ok(Route::Game(parse_id(game)?)),
            ["game", game, "data"] => Ok(Route::GameData(parse_id(game)?)),
            ["game", game, "screenshot"] => Ok(Route::Screenshots(parse_id(game)?)),
            ["game", game, "screenshot", shot] => Ok(Route::Screenshot(parse_id(game)?, parse_id(shot)?)),
            ["game", game, "highscore"] => Ok(Route::Highscores(parse_id(game)?)),
            ["game", game, "rating"] => Ok(Route::Rating(parse_id(game)?)),
            _ => Err(ApiError::NotFound),
        }
    }
}

/// Route one request against the store.
pub async fn handle_request(store: &GameStore, auth: &AuthConfig, request: ApiRequest<'_>) -> ApiResponse {
    debug!("{} {}", request.method, request.path);
    match route(store, auth, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn route(store: &GameStore, auth: &AuthConfig, req: ApiRequest<'_>) -> Result<ApiResponse, ApiError> {
    let user = || authenticate(auth, req.authorization).map_err(ApiError::Unauthorized);

    match (Route::parse(req.path)?, req.method) {
        (Route::Games, "GET") if has_query_flag(req.path, "mine") => {
            // Logged out there is no "my games" page at all
            let claims = user().map_err(|_| ApiError::NotFound)?;
            let links: Vec<String> = store.list_created_by(&claims.user_id()).await.iter().map(game_link).collect();
            ApiResponse::ok(&links)
        }
        (Route::Games, "GET") => {
            let links: Vec<String> = store.list().await.iter().map(game_link).collect();
            ApiResponse::ok(&links)
        }
        (Route::Games, "POST") => {
            let claims = user()?;
            let body: CreateGameRequest = parse_body(req.body)?;
            let id = store.create(claims.user_ref(), body).await;
            ApiResponse::created(&CreatedBody { id })
        }
        (Route::GameData(id), "GET") => ApiResponse::ok(&store.get(&id).await?),
        (Route::Game(id), "GET") => {
            let viewer = user().ok().map(|claims| claims.user_id());
            ApiResponse::ok(&store.page(&id, viewer.as_ref()).await?)
        }
        (Route::Game(id), "PUT") => {
            let claims = user()?;
            let body: UpdateGameRequest = parse_body(req.body)?;
            ApiResponse::ok(&store.update(&id, &claims.user_id(), body).await?)
        }
        (Route::Game(id), "DELETE") => {
            let claims = user()?;
            store.delete(&id, &claims.user_id()).await?;
            ApiResponse::ok(&MessageBody::new("Game deleted"))
        }
        (Route::Screenshots(id), "POST") => {
            let claims = user()?;
            let body: AddScreenshotRequest = parse_body(req.body)?;
            ApiResponse::created(&store.add_screenshot(&id, &claims.user_id(), body).await?)
        }
        (Route::Screenshot(id, sid), "PUT") => {
            let claims = user()?;
            let body: MoveScreenshotRequest = parse_body(req.body)?;
            ApiResponse::ok(&store.move_screenshot(&id, &sid, &claims.user_id(), body).await?)
        }
        (Route::Screenshot(id, sid), "DELETE") => {
            let claims = user()?;
            store.delete_screenshot(&id, &sid, &claims.user_id()).await?;
            ApiResponse::ok(&MessageBody::new("Screenshot deleted"))
        }
        (Route::Highscores(id), "GET") => ApiResponse::ok(&store.highscores(&id).await?),
        (Route::Highscores(id), "POST") => {
            let claims = user()?;
            let body: HighscoreSubmission = parse_body(req.body)?;
            let (outcome, list) = store.post_highscore(&id, &claims.user_ref(), body).await?;
            match outcome {
                MergeOutcome::Inserted => ApiResponse::created(&list),
                MergeOutcome::Improved | MergeOutcome::Unchanged => ApiResponse::ok(&list),
            }
        }
        (Route::Rating(id), "GET") => ApiResponse::ok(&RatingResponse {
            average_rating: store.rating(&id).await?,
        }),
        (Route::Rating(id), "POST") => {
            let body: RatingRequest = parse_body(req.body)?;
            let rating = validate_rating(body.rating)?;
            let claims = authenticate(auth, req.authorization).map_err(ApiError::Forbidden)?;
            let average_rating = store.rate(&id, &claims.user_ref(), rating).await?;
            ApiResponse::ok(&RatingResponse { average_rating })
        }
        _ => Err(ApiError::MethodNotAllowed),
    }
}

fn parse_id(segment: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(segment).map_err(|_| ApiError::NotFound)
}

fn authenticate(auth: &AuthConfig, header: Option<&str>) -> Result<TokenClaims, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?;
    let token = bearer_token(header).ok_or(AuthError::InvalidFormat)?;
    validate_token(token, auth)
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

// =============================================================================
// SERVER
// =============================================================================

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Game storage.
    store: GameStore,
    /// Token validation settings.
    auth: Arc<AuthConfig>,
    /// Bound listener.
    http: Arc<tiny_http::Server>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Bind the listener. Requests are served once [`run`](Self::run) is called.
    pub fn bind(config: ServerConfig, auth: AuthConfig, store: GameStore) -> Result<Self, GameServerError> {
        let http = tiny_http::Server::http(config.bind_addr)
            .map_err(|e| GameServerError::BindFailed(format!("{}: {}", config.bind_addr, e)))?;
        let (shutdown_tx, _) = broadcast::channel(1);

        if !auth.is_configured() {
            warn!("No AUTH_SECRET or AUTH_PUBLIC_KEY_PEM set; every authenticated route will return 401");
        }

        Ok(Self {
            config,
            store,
            auth: Arc::new(auth),
            http: Arc::new(http),
            shutdown_tx,
        })
    }

    /// Address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.http.server_addr().to_ip()
    }

    /// Load the configured seed file, if any.
    pub async fn load_seed_file(&self) -> Result<usize, GameServerError> {
        let Some(path) = &self.config.seed_file else {
            return Ok(0);
        };
        let contents = tokio::fs::read_to_string(path).await?;
        let games: Vec<SeedGame> = serde_json::from_str(&contents)?;
        Ok(self.store.load_seed(games).await.len())
    }

    /// Run the server until [`shutdown`](Self::shutdown) is called.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!(
            "Game server {} listening on {}",
            self.config.version,
            self.local_addr().unwrap_or(self.config.bind_addr)
        );

        loop {
            let http = self.http.clone();
            let mut next = tokio::task::spawn_blocking(move || http.recv_timeout(POLL_INTERVAL));

            tokio::select! {
                result = &mut next => {
                    match result {
                        Ok(Ok(Some(request))) => self.handle_connection(request),
                        Ok(Ok(None)) => {}
                        Ok(Err(e)) => error!("Accept error: {}", e),
                        Err(e) => return Err(GameServerError::Internal(e.to_string())),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    // Requests already accepted are still answered
                    self.http.unblock();
                    if let Ok(Ok(Some(request))) = next.await {
                        self.handle_connection(request);
                    }
                    while let Ok(Some(request)) = self.http.try_recv() {
                        self.handle_connection(request);
                    }
                    break;
                }
            }
        }

        Ok(())
    }

    /// Serve one request on its own task.
    fn handle_connection(&self, mut request: tiny_http::Request) {
        let store = self.store.clone();
        let auth = self.auth.clone();
        let max_body = self.config.max_body_bytes;

        tokio::spawn(async move {
            let read = tokio::task::spawn_blocking(move || {
                let body = read_body(&mut request, max_body);
                (request, body)
            })
            .await;
            let (request, body) = match read {
                Ok(parts) => parts,
                Err(e) => {
                    error!("Body reader panicked: {}", e);
                    return;
                }
            };

            let method = request.method().as_str().to_string();
            let path = request.url().to_string();
            let authorization = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Authorization"))
                .map(|h| h.value.as_str().to_string());

            let response = match body {
                Ok(body) => {
                    let api_request = ApiRequest {
                        method: &method,
                        path: &path,
                        body: &body,
                        authorization: authorization.as_deref(),
                    };
                    handle_request(&store, &auth, api_request).await
                }
                Err(e) => e.into_response(),
            };

            let sent = tokio::task::spawn_blocking(move || respond(request, response)).await;
            match sent {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Failed to send response for {} {}: {}", method, path, e),
                Err(e) => error!("Responder panicked: {}", e),
            }
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn read_body(request: &mut tiny_http::Request, limit: usize) -> Result<String, ApiError> {
    let mut body = String::new();
    request
        .as_reader()
        .take(limit as u64 + 1)
        .read_to_string(&mut body)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if body.len() > limit {
        return Err(ApiError::PayloadTooLarge);
    }
    Ok(body)
}

fn respond(request: tiny_http::Request, response: ApiResponse) -> std::io::Result<()> {
    let mut reply = tiny_http::Response::from_string(response.body.to_string())
        .with_status_code(response.status);
    if let Ok(header) = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        reply = reply.with_header(header);
    }
    request.respond(reply)
}
