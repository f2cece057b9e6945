//! Game Session
//!
//! Round/score engine and its state machine. A UI drives a session only
//! through the transition methods below:
//!
//! ```text
//! NotStarted ──fetch_game_data──▶ WaitingForNextRound ──next_round──▶ WaitingForGuess
//!                                        ▲                                 │
//!                                        └──────submit_guess (more)───────┤
//!                                                                          │
//!                                    GameOver ◀──submit_guess (last/max)───┘
//! ```

use std::collections::BTreeSet;
use std::fmt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::core::vec2::{CoordinateError, Vec2};
use crate::game::data::{GameData, Highscore, HighscoreSubmission, Screenshot};
use crate::game::score::score_guess;
use crate::network::client::{highscore_url, FetchError, GameBackend, HttpBackend};

/// Rounds per game unless configured otherwise.
pub const DEFAULT_MAX_ROUNDS: u32 = 5;

// =============================================================================
// PHASE
// =============================================================================

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamePhase {
    /// Game data not fetched yet.
    NotStarted,
    /// A screenshot is shown and the player may place a guess.
    WaitingForGuess,
    /// Round scored; the next screenshot has not been drawn.
    WaitingForNextRound,
    /// No further rounds. Highscores may still be posted.
    GameOver,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GamePhase::NotStarted => "not started",
            GamePhase::WaitingForGuess => "waiting for guess",
            GamePhase::WaitingForNextRound => "waiting for next round",
            GamePhase::GameOver => "game over",
        };
        f.write_str(name)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Engine errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    /// Argument of the wrong shape (bad number, bad URL).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not allowed in the current phase.
    #[error("cannot {operation} while {phase}")]
    InvalidState {
        /// Attempted operation.
        operation: &'static str,
        /// Phase at the time.
        phase: GamePhase,
    },

    /// Every screenshot has been played.
    #[error("no more screenshots")]
    NoMoreRounds,

    /// Score requested before any round was drawn.
    #[error("no round in progress")]
    NoCurrentRound,

    /// Talking to the game server failed.
    #[error("failed to reach game server: {0}")]
    Fetch(#[from] FetchError),
}

impl From<CoordinateError> for GameError {
    fn from(err: CoordinateError) -> Self {
        GameError::InvalidArgument(err.to_string())
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Per-session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Game ends after this many rounds even if screenshots remain.
    pub max_rounds: u32,
    /// Fixed seed for reproducible round order; OS entropy otherwise.
    pub rng_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            rng_seed: None,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One play-through of a game.
pub struct GameSession<B = HttpBackend> {
    url: Url,
    backend: B,
    config: SessionConfig,
    rng: StdRng,
    game_data: Option<GameData>,
    highscores: Vec<Highscore>,
    /// Indices into `game_data.screenshots`.
    played: BTreeSet<usize>,
    current: Option<usize>,
    guess: Option<Vec2>,
    total_score: u32,
    rounds_played: u32,
    phase: GamePhase,
}

impl GameSession<HttpBackend> {
    /// Create a session that talks HTTP to `url`.
    pub fn new(url: &str) -> Result<Self, GameError> {
        Self::with_backend(url, HttpBackend::new(), SessionConfig::default())
    }
}

impl<B: GameBackend> GameSession<B> {
    /// Create a session over a custom backend.
    pub fn with_backend(url: &str, backend: B, config: SessionConfig) -> Result<Self, GameError> {
        let url = Url::parse(url)
            .map_err(|e| GameError::InvalidArgument(format!("non-url argument {:?}: {}", url, e)))?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            url,
            backend,
            config,
            rng,
            game_data: None,
            highscores: Vec::new(),
            played: BTreeSet::new(),
            current: None,
            guess: None,
            total_score: 0,
            rounds_played: 0,
            phase: GamePhase::NotStarted,
        })
    }

    /// Fetch the game document. Only legal before the game starts.
    ///
    /// On failure the session stays in [`GamePhase::NotStarted`].
    pub async fn fetch_game_data(&mut self) -> Result<&GameData, GameError> {
        self.require_phase("fetch game data", GamePhase::NotStarted)?;

        let data = self.backend.fetch_game_data(&self.url).await?;
        info!(
            "Loaded game {} with {} screenshots",
            self.url,
            data.screenshots.len()
        );

        self.highscores = data.highscore_list.clone();
        self.phase = GamePhase::WaitingForNextRound;
        Ok(&*self.game_data.insert(data))
    }

    /// Record the player's guess for the current round.
    pub fn select_location(&mut self, x: f64, y: f64) -> Result<(), GameError> {
        self.require_phase("select a location", GamePhase::WaitingForGuess)?;
        self.guess = Some(Vec2::new(x, y)?);
        Ok(())
    }

    /// Draw the next screenshot and return its URL.
    ///
    /// A round still waiting for a guess is submitted first with whatever
    /// guess was recorded (scoring 0 without one).
    pub fn next_round(&mut self) -> Result<&str, GameError> {
        if self.phase == GamePhase::WaitingForGuess {
            let score = self.submit_guess()?;
            debug!("Unsubmitted round scored {} before advancing", score);
        }

        let remaining = match &self.game_data {
            Some(_) => self.remaining_indices(),
            None => {
                return Err(GameError::InvalidState {
                    operation: "start the next round",
                    phase: self.phase,
                })
            }
        };

        if remaining.is_empty() {
            return Err(GameError::NoMoreRounds);
        }
        self.require_phase("start the next round", GamePhase::WaitingForNextRound)?;

        let index = remaining[self.rng.gen_range(0..remaining.len())];
        self.played.insert(index);
        self.current = Some(index);
        self.guess = None;
        self.phase = GamePhase::WaitingForGuess;

        let screenshot = self.screenshot(index)?;
        debug!("Round {} shows screenshot #{}", self.rounds_played + 1, index);
        Ok(&screenshot.url)
    }

    /// Score the current guess without changing any state.
    pub fn calculate_score(&self) -> Result<u32, GameError> {
        let correct = self
            .current_screenshot()
            .ok_or(GameError::NoCurrentRound)?
            .correct_answer;

        Ok(match self.guess {
            Some(guess) => score_guess(guess, correct),
            None => 0,
        })
    }

    /// Lock in the current guess and return the round score.
    pub fn submit_guess(&mut self) -> Result<u32, GameError> {
        self.require_phase("submit a guess", GamePhase::WaitingForGuess)?;

        let score = self.calculate_score()?;
        self.total_score += score;
        self.rounds_played += 1;

        self.phase = if self.remaining_rounds() == 0 {
            GamePhase::GameOver
        } else {
            GamePhase::WaitingForNextRound
        };

        debug!(
            "Round {} scored {} (total {}), now {}",
            self.rounds_played, score, self.total_score, self.phase
        );
        Ok(score)
    }

    /// Submit a result to the game's leaderboard.
    ///
    /// On success the local list is replaced by the server's merged list.
    /// On failure local state is left as it was.
    pub async fn post_highscore(&mut self, score: u32, time: f64) -> Result<&[Highscore], GameError> {
        if !time.is_finite() || time < 0.0 {
            return Err(GameError::InvalidArgument(format!(
                "time must be a non-negative number, got {}",
                time
            )));
        }

        let url = highscore_url(&self.url)
            .map_err(|e| GameError::InvalidArgument(format!("no highscore url: {}", e)))?;
        let list = self
            .backend
            .post_highscore(&url, HighscoreSubmission { score, time })
            .await?;

        info!("Posted highscore {} in {:.3}s to {}", score, time, url);
        self.highscores = list;
        Ok(&self.highscores)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// True once no more rounds can be played.
    pub fn is_game_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    /// Game URL this session was created with.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Map image URL, once game data is loaded.
    pub fn map_url(&self) -> Option<&str> {
        self.game_data.as_ref().map(|d| d.map_url.as_str())
    }

    /// Loaded game data.
    pub fn game_data(&self) -> Option<&GameData> {
        self.game_data.as_ref()
    }

    /// Sum of all submitted round scores.
    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    /// Number of submitted rounds.
    pub fn rounds_played(&self) -> u32 {
        self.rounds_played
    }

    /// Recorded guess for the current round.
    pub fn guess_position(&self) -> Option<Vec2> {
        self.guess
    }

    /// Screenshot of the current (or last) round.
    pub fn current_screenshot(&self) -> Option<&Screenshot> {
        self.current.and_then(|index| self.screenshot(index).ok())
    }

    /// Latest known leaderboard, unsorted.
    pub fn highscores(&self) -> &[Highscore] {
        &self.highscores
    }

    /// Rounds that can still be drawn, bounded by both unplayed screenshots
    /// and the round limit.
    pub fn remaining_rounds(&self) -> u32 {
        let unplayed = self
            .game_data
            .as_ref()
            .map(|d| d.screenshots.len().saturating_sub(self.played.len()))
            .unwrap_or(0) as u32;
        let allowed = self.config.max_rounds.saturating_sub(self.rounds_played);
        unplayed.min(allowed)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn require_phase(&self, operation: &'static str, expected: GamePhase) -> Result<(), GameError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(GameError::InvalidState {
                operation,
                phase: self.phase,
            })
        }
    }

    fn remaining_indices(&self) -> Vec<usize> {
        let count = self.game_data.as_ref().map_or(0, |d| d.screenshots.len());
        (0..count).filter(|i| !self.played.contains(i)).collect()
    }

    fn screenshot(&self, index: usize) -> Result<&Screenshot, GameError> {
        self.game_data
            .as_ref()
            .and_then(|d| d.screenshots.get(index))
            .ok_or(GameError::NoCurrentRound)
    }
}

// =============================================================================
// TESTS
// =============================================================================
