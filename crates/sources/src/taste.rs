//! Build a user's taste profile from their rating history.
//!
//! The profile is everything the scorer needs to know about the user:
//! - the liked set (movies rated at or above the like threshold)
//! - the top genres among liked movies
//! - the top tags among liked movies
//!
//! Ratings below the threshold are ignored entirely; they are not treated
//! as negative signal.

use data_loader::{DataError, Dataset, GenreId, MovieId, Result, TagId, UserId};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Knobs for taste inference
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TasteConfig {
    /// Minimum score for a rating to count as "liked"
    pub like_threshold: f32,
    /// How many genres make up the user's top genres
    pub top_genres: usize,
    /// How many tags make up the user's top tags
    pub top_tags: usize,
}

impl Default for TasteConfig {
    fn default() -> Self {
        Self {
            like_threshold: 4.0,
            top_genres: 5,
            top_tags: 10,
        }
    }
}

impl TasteConfig {
    /// Configure the like threshold (default: 4.0)
    pub fn with_like_threshold(mut self, threshold: f32) -> Self {
        self.like_threshold = threshold;
        self
    }

    /// Configure how many top genres to keep (default: 5)
    pub fn with_top_genres(mut self, n: usize) -> Self {
        self.top_genres = n;
        self
    }

    /// Configure how many top tags to keep (default: 10)
    pub fn with_top_tags(mut self, n: usize) -> Self {
        self.top_tags = n;
        self
    }
}

/// What the scorer knows about one user
#[derive(Debug, Clone, PartialEq)]
pub struct TasteProfile {
    pub user_id: UserId,
    /// Movies rated at or above the like threshold; never recommended back
    pub liked_movies: HashSet<MovieId>,
    /// Most frequent genres among liked movies, most frequent first
    pub top_genres: Vec<GenreId>,
    /// Most frequent tags among liked movies, most frequent first
    pub top_tags: Vec<TagId>,
}

impl TasteProfile {
    /// Profile of a user with no usable history
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            liked_movies: HashSet::new(),
            top_genres: Vec::new(),
            top_tags: Vec::new(),
        }
    }

    /// True when no collaborative signal is available
    pub fn is_cold(&self) -> bool {
        self.liked_movies.is_empty()
    }
}

/// Build the taste profile of `user_id`.
///
/// Unknown users are `NotFound`; a known user without ratings gets an empty
/// profile, which is a valid input to scoring.
#[instrument(skip(data, config))]
pub fn build_taste_profile<D>(data: &D, user_id: UserId, config: &TasteConfig) -> Result<TasteProfile>
where
    D: Dataset + ?Sized,
{
    if !data.has_user(user_id) {
        return Err(DataError::not_found("User", user_id));
    }

    let liked_movies = data.liked_movies(user_id, config.like_threshold);
    if liked_movies.is_empty() {
        debug!("user has no liked movies");
        return Ok(TasteProfile::empty(user_id));
    }

    // Counts come back ordered by count desc, id asc
    let top_genres: Vec<GenreId> = data
        .genre_counts(&liked_movies)
        .into_iter()
        .take(config.top_genres)
        .map(|(genre_id, _)| genre_id)
        .collect();

    let top_tags: Vec<TagId> = data
        .tag_counts(&liked_movies)
        .into_iter()
        .take(config.top_tags)
        .map(|(tag_id, _)| tag_id)
        .collect();

    debug!(
        "liked={} top_genres={:?} top_tags={:?}",
        liked_movies.len(),
        top_genres,
        top_tags
    );

    Ok(TasteProfile {
        user_id,
        liked_movies,
        top_genres,
        top_tags,
    })
}
