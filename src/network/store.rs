//! Game Store
//!
//! In-memory storage behind the HTTP API: games, their screenshots, the
//! per-user highscore list and star ratings. All access goes through one
//! `RwLock`. Listings are ordered by average rating, ties in id order.

use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::vec2::Vec2;
use crate::game::data::HighscoreSubmission;
use crate::game::highscore::{is_improvement, MergeOutcome};
use crate::network::auth::{UserId, UserRef};
use crate::network::protocol::{
    AddScreenshotRequest, CreateGameRequest, MoveScreenshotRequest, UpdateGameRequest,
};

/// Lowest accepted star rating.
pub const MIN_RATING: f64 = 1.0;
/// Highest accepted star rating.
pub const MAX_RATING: f64 = 5.0;

// =============================================================================
// RECORDS
// =============================================================================

/// A placed screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredScreenshot {
    /// Screenshot id.
    pub id: Uuid,
    /// Image URL.
    pub url: String,
    /// Ground-truth location.
    pub correct_answer: Vec2,
}

/// One user's best result on a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighscoreEntry {
    /// Who played.
    pub user: UserRef,
    /// Best score.
    pub score: u32,
    /// Time of the best score, in seconds.
    pub time: f64,
    /// When the entry last changed.
    pub updated_at: DateTime<Utc>,
}

/// One user's star rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    /// Who rated.
    pub user: UserRef,
    /// Stars, 1.0..=5.0. Fractions allowed.
    pub rating: f64,
}

/// A game as served on `/game/<id>/data`.
///
/// Decodes as [`GameData`](crate::game::data::GameData) on the player side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    /// Game id.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Map image URL.
    pub map_url: String,
    /// Owner; only they may edit.
    pub creator: UserRef,
    /// Screenshots in placement order.
    pub screenshots: Vec<StoredScreenshot>,
    /// One entry per user, in insertion order.
    pub highscore_list: Vec<HighscoreEntry>,
    /// One rating per user.
    pub ratings: Vec<RatingEntry>,
    /// Mean rating, `None` until rated.
    pub average_rating: Option<f64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl GameRecord {
    /// New empty game owned by `creator`.
    pub fn new(creator: UserRef, title: String, description: String, map_url: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            map_url,
            creator,
            screenshots: Vec::new(),
            highscore_list: Vec::new(),
            ratings: Vec::new(),
            average_rating: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A game can be played once it has a map and at least one screenshot.
    pub fn playable(&self) -> bool {
        !self.map_url.is_empty() && !self.screenshots.is_empty()
    }

    /// The rating `user` gave, if any.
    pub fn rating_by(&self, user: &UserId) -> Option<f64> {
        self.ratings.iter().find(|r| r.user.id == *user).map(|r| r.rating)
    }

    /// Game page as `viewer` sees it.
    pub fn page(&self, viewer: Option<&UserId>) -> GamePage {
        GamePage {
            playable: self.playable(),
            editable: viewer.is_some_and(|v| self.creator.id == *v),
            user_rating: viewer.and_then(|v| self.rating_by(v)),
            game: self.clone(),
        }
    }

    fn ensure_creator(&self, user: &UserId) -> Result<(), StoreError> {
        if self.creator.id == *user {
            Ok(())
        } else {
            Err(StoreError::NotCreator)
        }
    }

    fn screenshot_mut(&mut self, sid: &Uuid) -> Result<&mut StoredScreenshot, StoreError> {
        self.screenshots
            .iter_mut()
            .find(|s| s.id == *sid)
            .ok_or(StoreError::ScreenshotNotFound(*sid))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A game plus the flags a game page renders from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePage {
    /// The game itself.
    #[serde(flatten)]
    pub game: GameRecord,
    /// Map set and at least one screenshot placed.
    pub playable: bool,
    /// Viewer is the creator.
    pub editable: bool,
    /// Viewer's own rating.
    pub user_rating: Option<f64>,
}

// =============================================================================
// MERGE RULES
// =============================================================================

/// Merge a result into a per-user highscore list.
pub fn merge_highscore(
    list: &mut Vec<HighscoreEntry>,
    user: &UserRef,
    score: u32,
    time: f64,
    now: DateTime<Utc>,
) -> MergeOutcome {
    let Some(index) = list.iter().position(|e| e.user.id == user.id) else {
        list.push(HighscoreEntry {
            user: user.clone(),
            score,
            time,
            updated_at: now,
        });
        return MergeOutcome::Inserted;
    };

    match list.get_mut(index) {
        Some(entry) if is_improvement(score, time, entry.score, entry.time) => {
            entry.user.username = user.username.clone();
            entry.score = score;
            entry.time = time;
            entry.updated_at = now;
            MergeOutcome::Improved
        }
        _ => MergeOutcome::Unchanged,
    }
}

/// Mean of all ratings, `None` if empty.
pub fn average_rating(ratings: &[RatingEntry]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: f64 = ratings.iter().map(|r| r.rating).sum();
    Some(sum / ratings.len() as f64)
}

/// Check a star rating: finite and within 1..=5.
pub fn validate_rating(rating: f64) -> Result<f64, StoreError> {
    if rating.is_finite() && (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(StoreError::RatingOutOfRange(rating))
    }
}

/// Ids in listing order: best average rating first, unrated last.
fn by_rating<'a>(games: impl Iterator<Item = &'a GameRecord>) -> Vec<Uuid> {
    let mut ranked: Vec<(Uuid, f64)> = games
        .map(|game| (game.id, game.average_rating.unwrap_or(0.0)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.into_iter().map(|(id, _)| id).collect()
}

// =============================================================================
// ERRORS
// =============================================================================

/// Store errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// No game with that id.
    #[error("Game not found: {0}")]
    GameNotFound(Uuid),

    /// No screenshot with that id in the game.
    #[error("Screenshot not found: {0}")]
    ScreenshotNotFound(Uuid),

    /// Caller does not own the game.
    #[error("Only the creator may modify this game")]
    NotCreator,

    /// Rating outside 1..=5.
    #[error("Rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(f64),

    /// Time not finite or negative.
    #[error("Invalid highscore time: {0}")]
    InvalidScore(f64),
}

impl StoreError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::GameNotFound(_) | StoreError::ScreenshotNotFound(_) => 404,
            StoreError::NotCreator => 403,
            StoreError::RatingOutOfRange(_) | StoreError::InvalidScore(_) => 400,
        }
    }
}

// =============================================================================
// SEED DATA
// =============================================================================

/// Creator of a seeded game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedUser {
    /// Token subject the creator will log in with.
    pub sub: String,
    /// Display name.
    pub username: String,
}

/// A screenshot in a seed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedScreenshot {
    /// Image URL.
    pub url: String,
    /// Ground-truth location.
    pub correct_answer: Vec2,
}

/// A game in a seed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedGame {
    /// Title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Map image URL.
    pub map_url: String,
    /// Owner.
    pub creator: SeedUser,
    /// Screenshots in order.
    #[serde(default)]
    pub screenshots: Vec<SeedScreenshot>,
}

// =============================================================================
// STORE
// =============================================================================

/// Shared in-memory game store. Cloning shares the same data.
#[derive(Clone, Default)]
pub struct GameStore {
    games: Arc<RwLock<BTreeMap<Uuid, GameRecord>>>,
}

impl GameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert seed games, returning their new ids in order.
    pub async fn load_seed(&self, seed: Vec<SeedGame>) -> Vec<Uuid> {
        let mut games = self.games.write().await;
        let ids: Vec<Uuid> = seed
            .into_iter()
            .map(|game| {
                let creator = UserRef::from_subject(&game.creator.sub, game.creator.username);
                let mut record = GameRecord::new(creator, game.title, game.description, game.map_url);
                record.screenshots = game
                    .screenshots
                    .into_iter()
                    .map(|s| StoredScreenshot {
                        id: Uuid::new_v4(),
                        url: s.url,
                        correct_answer: s.correct_answer,
                    })
                    .collect();
                let id = record.id;
                games.insert(id, record);
                id
            })
            .collect();
        info!("Loaded {} seed games", ids.len());
        ids
    }

    /// Ids of all games, best rated first.
    pub async fn list(&self) -> Vec<Uuid> {
        by_rating(self.games.read().await.values())
    }

    /// Ids of the games `creator` made, best rated first.
    pub async fn list_created_by(&self, creator: &UserId) -> Vec<Uuid> {
        let games = self.games.read().await;
        by_rating(games.values().filter(|game| game.creator.id == *creator))
    }

    /// Create a game owned by `creator`.
    pub async fn create(&self, creator: UserRef, req: CreateGameRequest) -> Uuid {
        let record = GameRecord::new(creator, req.title, req.description, req.map_url);
        let id = record.id;
        debug!("Created game {} by {}", id, record.creator.username);
        self.games.write().await.insert(id, record);
        id
    }

    /// Fetch a game.
    pub async fn get(&self, id: &Uuid) -> Result<GameRecord, StoreError> {
        self.games
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(StoreError::GameNotFound(*id))
    }

    /// Game page for `viewer`.
    pub async fn page(&self, id: &Uuid, viewer: Option<&UserId>) -> Result<GamePage, StoreError> {
        self.games
            .read()
            .await
            .get(id)
            .map(|game| game.page(viewer))
            .ok_or(StoreError::GameNotFound(*id))
    }

    /// Edit title, description or map.
    pub async fn update(&self, id: &Uuid, user: &UserId, req: UpdateGameRequest) -> Result<GameRecord, StoreError> {
        self.modify(id, user, |game| {
            if let Some(title) = req.title {
                game.title = title;
            }
            if let Some(description) = req.description {
                game.description = description;
            }
            if let Some(map_url) = req.map_url {
                game.map_url = map_url;
            }
            Ok(game.clone())
        })
        .await
    }

    /// Delete a game.
    pub async fn delete(&self, id: &Uuid, user: &UserId) -> Result<(), StoreError> {
        let mut games = self.games.write().await;
        games.get(id).ok_or(StoreError::GameNotFound(*id))?.ensure_creator(user)?;
        games.remove(id);
        debug!("Deleted game {}", id);
        Ok(())
    }

    /// Place a new screenshot.
    pub async fn add_screenshot(
        &self,
        id: &Uuid,
        user: &UserId,
        req: AddScreenshotRequest,
    ) -> Result<StoredScreenshot, StoreError> {
        self.modify(id, user, |game| {
            let screenshot = StoredScreenshot {
                id: Uuid::new_v4(),
                url: req.url,
                correct_answer: req.correct_answer,
            };
            game.screenshots.push(screenshot.clone());
            Ok(screenshot)
        })
        .await
    }

    /// Move a screenshot's ground-truth marker.
    pub async fn move_screenshot(
        &self,
        id: &Uuid,
        sid: &Uuid,
        user: &UserId,
        req: MoveScreenshotRequest,
    ) -> Result<StoredScreenshot, StoreError> {
        self.modify(id, user, |game| {
            let screenshot = game.screenshot_mut(sid)?;
            screenshot.correct_answer = req.correct_answer;
            Ok(screenshot.clone())
        })
        .await
    }

    /// Remove a screenshot.
    pub async fn delete_screenshot(&self, id: &Uuid, sid: &Uuid, user: &UserId) -> Result<(), StoreError> {
        self.modify(id, user, |game| {
            let before = game.screenshots.len();
            game.screenshots.retain(|s| s.id != *sid);
            if game.screenshots.len() == before {
                return Err(StoreError::ScreenshotNotFound(*sid));
            }
            Ok(())
        })
        .await
    }

    /// Current highscore list.
    pub async fn highscores(&self, id: &Uuid) -> Result<Vec<HighscoreEntry>, StoreError> {
        self.get(id).await.map(|game| game.highscore_list)
    }

    /// Merge a finished game's result. Any logged-in user may post.
    pub async fn post_highscore(
        &self,
        id: &Uuid,
        user: &UserRef,
        submission: HighscoreSubmission,
    ) -> Result<(MergeOutcome, Vec<HighscoreEntry>), StoreError> {
        if !submission.time.is_finite() || submission.time < 0.0 {
            return Err(StoreError::InvalidScore(submission.time));
        }

        let mut games = self.games.write().await;
        let game = games.get_mut(id).ok_or(StoreError::GameNotFound(*id))?;
        let outcome = merge_highscore(
            &mut game.highscore_list,
            user,
            submission.score,
            submission.time,
            Utc::now(),
        );
        debug!(
            "Highscore {} / {:.1}s by {} on {}: {:?}",
            submission.score, submission.time, user.username, id, outcome
        );
        Ok((outcome, game.highscore_list.clone()))
    }

    /// Current average rating.
    pub async fn rating(&self, id: &Uuid) -> Result<Option<f64>, StoreError> {
        self.get(id).await.map(|game| game.average_rating)
    }

    /// Rate a game; re-rating replaces the user's previous rating.
    pub async fn rate(&self, id: &Uuid, user: &UserRef, rating: f64) -> Result<Option<f64>, StoreError> {
        let stars = validate_rating(rating)?;

        let mut games = self.games.write().await;
        let game = games.get_mut(id).ok_or(StoreError::GameNotFound(*id))?;
        match game.ratings.iter_mut().find(|r| r.user.id == user.id) {
            Some(existing) => existing.rating = stars,
            None => game.ratings.push(RatingEntry { user: user.clone(), rating: stars }),
        }
        game.average_rating = average_rating(&game.ratings);
        Ok(game.average_rating)
    }

    /// Apply a creator-only edit.
    async fn modify<T>(
        &self,
        id: &Uuid,
        user: &UserId,
        edit: impl FnOnce(&mut GameRecord) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut games = self.games.write().await;
        let game = games.get_mut(id).ok_or(StoreError::GameNotFound(*id))?;
        game.ensure_creator(user)?;
        let result = edit(game)?;
        game.touch();
        Ok(result)
    }
}

// =============================================================================
// TESTS
// =============================================================================
