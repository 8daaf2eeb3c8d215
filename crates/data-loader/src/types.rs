//! Core domain types for the recommendation dataset.
//!
//! This module defines the fundamental data structures used throughout the system:
//! users, movies with their genre/tag references, ratings, the denormalized
//! per-movie statistics, the per-user recommendation cache and stored embeddings.
//! `DataIndex` is the in-memory store that owns all of them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a user
pub type UserId = u32;

/// Unique identifier for a movie
pub type MovieId = u32;

/// Unique identifier for a genre label
pub type GenreId = u32;

/// Unique identifier for a tag label
pub type TagId = u32;

/// Identifier of any embedded object (movie, user or tag)
pub type ObjectId = u32;

/// Lowest accepted rating score
pub const MIN_RATING: f32 = 0.0;

/// Highest accepted rating score
pub const MAX_RATING: f32 = 5.0;

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

// =============================================================================
// Movie-related Types
// =============================================================================

/// Represents a movie in the catalog.
///
/// The rating aggregates are not stored here; they live in `MovieStats` and
/// are owned by the aggregate maintainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    #[serde(default)]
    pub release_year: Option<u16>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub genre_ids: Vec<GenreId>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
    /// External popularity signal, if known
    #[serde(default)]
    pub popularity: Option<f32>,
    /// External vote average, if known
    #[serde(default)]
    pub vote_average: Option<f32>,
}

impl Movie {
    /// Movie with a title and nothing else
    pub fn new(id: MovieId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            release_year: None,
            overview: String::new(),
            genre_ids: Vec::new(),
            tag_ids: Vec::new(),
            popularity: None,
            vote_average: None,
        }
    }
}

/// Genre label. Names are unique case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,
    pub name: String,
}

/// Free-form tag label. Names are unique case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

// =============================================================================
// Rating Type
// =============================================================================

/// A user's score for a movie. At most one exists per (user, movie) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    /// Score from 0.0 to 5.0
    pub rating: f32,
    /// Unix timestamp of the last write
    #[serde(default)]
    pub timestamp: i64,
}

/// True when `score` lies in the accepted [0.0, 5.0] range
pub fn is_valid_score(score: f32) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&score)
}

// =============================================================================
// Interaction Events
// =============================================================================

/// What a user did with a movie on a recommendation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Impression,
    Click,
    Like,
    Dismiss,
    Rate,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Impression => "impression",
            EventKind::Click => "click",
            EventKind::Like => "like",
            EventKind::Dismiss => "dismiss",
            EventKind::Rate => "rate",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for EventKind {
    type Err = crate::DataError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "impression" => Ok(EventKind::Impression),
            "click" => Ok(EventKind::Click),
            "like" => Ok(EventKind::Like),
            "dismiss" => Ok(EventKind::Dismiss),
            "rate" => Ok(EventKind::Rate),
            other => Err(crate::DataError::InvalidInput(format!(
                "unknown event kind '{}'",
                other
            ))),
        }
    }
}

/// One logged interaction. Append-only.
///
/// Anonymous events carry no user; page-level events carry no movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub movie_id: Option<MovieId>,
    pub kind: EventKind,
    /// Unix timestamp of the interaction
    #[serde(default)]
    pub timestamp: i64,
    /// Free-form surface details, e.g. `{"lane": "trending", "slot": 3}`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl Event {
    pub fn new(
        user_id: Option<UserId>,
        movie_id: Option<MovieId>,
        kind: EventKind,
        timestamp: i64,
    ) -> Self {
        Self {
            user_id,
            movie_id,
            kind,
            timestamp,
            context: BTreeMap::new(),
        }
    }
}

// =============================================================================
// Statistics Types
// =============================================================================

/// Denormalized rating aggregates for one movie.
///
/// Always consistent with the current rating rows once a recompute for the
/// movie has completed. A movie without ratings has `(0.0, 0)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieStats {
    pub avg_rating: f32,
    pub rating_count: u32,
}

/// Scoring view of a movie as returned by `candidate_movies`.
///
/// Numeric inputs stay optional here; the scorer coalesces missing values to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMovie {
    pub id: MovieId,
    pub title: String,
    /// `None` when the movie has no aggregate row yet
    pub stats: Option<MovieStats>,
    pub popularity: Option<f32>,
    pub vote_average: Option<f32>,
    pub genre_ids: Vec<GenreId>,
    pub tag_ids: Vec<TagId>,
}

// =============================================================================
// Recommender Artifacts
// =============================================================================

/// Snapshot of the top-K recommended movie ids for one user.
///
/// Overwritten wholesale on rebuild, never partially updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCache {
    pub user_id: UserId,
    pub items: Vec<MovieId>,
    pub model_version: String,
}

/// Kind of object an embedding describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Movie,
    User,
    Tag,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectType::Movie => "movie",
            ObjectType::User => "user",
            ObjectType::Tag => "tag",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ObjectType {
    type Err = crate::DataError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "movie" => Ok(ObjectType::Movie),
            "user" => Ok(ObjectType::User),
            "tag" => Ok(ObjectType::Tag),
            other => Err(crate::DataError::InvalidInput(format!(
                "unknown object type '{}'",
                other
            ))),
        }
    }
}

/// Uniqueness key of an embedding: (object_type, object_id, model_version)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmbeddingKey {
    pub object_type: ObjectType,
    pub object_id: ObjectId,
    pub model_version: String,
}

/// Fixed-dimension vector stored for one object under one model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub object_type: ObjectType,
    pub object_id: ObjectId,
    pub model_version: String,
    /// Declared dimension; must equal `vector.len()`
    pub dim: usize,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(
        object_type: ObjectType,
        object_id: ObjectId,
        model_version: impl Into<String>,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            object_type,
            object_id,
            model_version: model_version.into(),
            dim: vector.len(),
            vector,
        }
    }

    pub fn key(&self) -> EmbeddingKey {
        EmbeddingKey {
            object_type: self.object_type,
            object_id: self.object_id,
            model_version: self.model_version.clone(),
        }
    }
}

// =============================================================================
// DataIndex - The Core In-Memory Store
// =============================================================================

/// Main data structure that holds all data and indices.
///
/// Ratings are indexed twice (per user and per movie) for O(1) lookups in
/// both directions. Genre and tag names are indexed lowercased so inserts
/// deduplicate case-insensitively.
///
/// Rating rows are not writable directly from outside the crate; they change
/// through `aggregates::rate` / `aggregates::unrate`, which keep `MovieStats`
/// in step:
///
/// ```compile_fail
/// use data_loader::{aggregates, DataIndex, Movie, User};
///
/// let mut index = DataIndex::new();
/// index.insert_user(User { id: 1, username: "alice".to_string() });
/// index.insert_movie(Movie::new(1, "Heat"));
/// aggregates::rate(&mut index, 1, 1, 5.0, 0).unwrap();
/// index.remove_rating(1, 1);
/// ```
#[derive(Debug, Default)]
pub struct DataIndex {
    // Primary data stores
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) movies: HashMap<MovieId, Movie>,
    pub(crate) genres: BTreeMap<GenreId, Genre>,
    pub(crate) tags: BTreeMap<TagId, Tag>,

    // Lowercased name -> id
    pub(crate) genre_names: HashMap<String, GenreId>,
    pub(crate) tag_names: HashMap<String, TagId>,

    // Rating indices for fast lookups
    /// All ratings made by each user
    pub(crate) user_ratings: HashMap<UserId, Vec<Rating>>,
    /// All ratings received by each movie
    pub(crate) movie_ratings: HashMap<MovieId, Vec<Rating>>,

    // Derived state
    pub(crate) movie_stats: HashMap<MovieId, MovieStats>,
    pub(crate) rec_cache: HashMap<UserId, RecommendationCache>,
    pub(crate) embeddings: HashMap<EmbeddingKey, Embedding>,

    /// Interaction log in insertion order
    pub(crate) events: Vec<Event>,
}

impl DataIndex {
    /// Creates a new, empty DataIndex
    pub fn new() -> Self {
        Self::default()
    }

    // Getters

    pub fn get_user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn get_movie(&self, id: MovieId) -> Option<&Movie> {
        self.movies.get(&id)
    }

    pub fn get_genre(&self, id: GenreId) -> Option<&Genre> {
        self.genres.get(&id)
    }

    pub fn get_tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(&id)
    }

    /// Get all ratings made by a user
    ///
    /// Returns an empty slice if user has no ratings
    pub fn get_user_ratings(&self, user_id: UserId) -> &[Rating] {
        self.user_ratings
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Get all ratings for a movie
    pub fn get_movie_ratings(&self, movie_id: MovieId) -> &[Rating] {
        self.movie_ratings
            .get(&movie_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Get the maintained statistics for a movie
    pub fn get_movie_stats(&self, movie_id: MovieId) -> Option<&MovieStats> {
        self.movie_stats.get(&movie_id)
    }

    pub fn get_recommendation_cache(&self, user_id: UserId) -> Option<&RecommendationCache> {
        self.rec_cache.get(&user_id)
    }

    pub fn get_events(&self) -> &[Event] {
        &self.events
    }

    /// All user ids in ascending order
    pub fn get_all_user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.users.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All movie ids in ascending order
    pub fn get_all_movie_ids(&self) -> Vec<MovieId> {
        let mut ids: Vec<MovieId> = self.movies.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Genre names of a movie, in the movie's own order
    pub fn genre_names_of(&self, movie: &Movie) -> Vec<String> {
        movie
            .genre_ids
            .iter()
            .filter_map(|id| self.genres.get(id).map(|g| g.name.clone()))
            .collect()
    }

    /// Tag names of a movie, in the movie's own order
    pub fn tag_names_of(&self, movie: &Movie) -> Vec<String> {
        movie
            .tag_ids
            .iter()
            .filter_map(|id| self.tags.get(id).map(|t| t.name.clone()))
            .collect()
    }

    // Mutators

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Insert or replace a movie. Aggregates are left to the maintainer.
    pub fn insert_movie(&mut self, movie: Movie) {
        self.movies.insert(movie.id, movie);
    }

    /// Remove a movie together with its ratings, stats, embeddings and events
    pub fn remove_movie(&mut self, movie_id: MovieId) -> Option<Movie> {
        let movie = self.movies.remove(&movie_id)?;
        if let Some(ratings) = self.movie_ratings.remove(&movie_id) {
            for rating in ratings {
                if let Some(list) = self.user_ratings.get_mut(&rating.user_id) {
                    list.retain(|r| r.movie_id != movie_id);
                }
            }
        }
        self.movie_stats.remove(&movie_id);
        self.embeddings
            .retain(|key, _| !(key.object_type == ObjectType::Movie && key.object_id == movie_id));
        self.events.retain(|e| e.movie_id != Some(movie_id));
        Some(movie)
    }

    /// Return the id of the genre with this name, creating it if needed.
    ///
    /// "Drama" and "drama" resolve to the same genre.
    pub fn get_or_insert_genre(&mut self, name: &str) -> GenreId {
        let key = name.trim().to_lowercase();
        if let Some(&id) = self.genre_names.get(&key) {
            return id;
        }
        let id = self.genres.keys().next_back().map_or(1, |last| last + 1);
        self.genres.insert(
            id,
            Genre {
                id,
                name: name.trim().to_string(),
            },
        );
        self.genre_names.insert(key, id);
        id
    }

    /// Return the id of the tag with this name, creating it if needed
    pub fn get_or_insert_tag(&mut self, name: &str) -> TagId {
        let key = name.trim().to_lowercase();
        if let Some(&id) = self.tag_names.get(&key) {
            return id;
        }
        let id = self.tags.keys().next_back().map_or(1, |last| last + 1);
        self.tags.insert(
            id,
            Tag {
                id,
                name: name.trim().to_string(),
            },
        );
        self.tag_names.insert(key, id);
        id
    }

    /// Insert a rating, replacing any earlier rating of the same movie by the same user.
    ///
    /// Returns the replaced rating, if any. This does not touch `MovieStats`;
    /// outside this crate ratings change only through `aggregates::rate`.
    pub(crate) fn insert_rating(&mut self, rating: Rating) -> Option<Rating> {
        let by_user = self.user_ratings.entry(rating.user_id).or_default();
        let previous = match by_user.iter_mut().find(|r| r.movie_id == rating.movie_id) {
            Some(existing) => Some(std::mem::replace(existing, rating)),
            None => {
                by_user.push(rating);
                None
            }
        };

        let by_movie = self.movie_ratings.entry(rating.movie_id).or_default();
        match by_movie.iter_mut().find(|r| r.user_id == rating.user_id) {
            Some(existing) => *existing = rating,
            None => by_movie.push(rating),
        }

        previous
    }

    /// Remove the rating of `movie_id` by `user_id`, returning it if it existed
    pub(crate) fn remove_rating(&mut self, user_id: UserId, movie_id: MovieId) -> Option<Rating> {
        let by_user = self.user_ratings.get_mut(&user_id)?;
        let pos = by_user.iter().position(|r| r.movie_id == movie_id)?;
        let removed = by_user.remove(pos);

        if let Some(by_movie) = self.movie_ratings.get_mut(&movie_id) {
            by_movie.retain(|r| r.user_id != user_id);
        }
        Some(removed)
    }

    /// Insert or replace an embedding under its (type, id, version) key
    pub fn insert_embedding(&mut self, embedding: Embedding) {
        self.embeddings.insert(embedding.key(), embedding);
    }

    /// Get counts for debugging/validation: (users, movies, ratings)
    pub fn counts(&self) -> (usize, usize, usize) {
        let total_ratings = self.user_ratings.values().map(|v| v.len()).sum();
        (self.users.len(), self.movies.len(), total_ratings)
    }
}
