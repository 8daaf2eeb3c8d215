//! Query interface the recommendation core consumes.
//!
//! The scorer, the aggregate maintainer and the similarity helper only ever
//! talk to a store through these traits, so any backend offering group-by
//! counting and set-membership filters can stand in for `DataIndex`.

use crate::error::Result;
use crate::types::{
    CandidateMovie, Embedding, Event, EventKind, GenreId, MovieId, MovieStats, ObjectId,
    ObjectType, Rating, RecommendationCache, TagId, UserId,
};
use std::collections::HashSet;

/// Read side of the dataset.
///
/// `Send + Sync` so a shared store can be scored from worker threads.
pub trait Dataset: Send + Sync {
    fn has_user(&self, user_id: UserId) -> bool;

    fn has_movie(&self, movie_id: MovieId) -> bool;

    /// All user ids, ascending
    fn user_ids(&self) -> Vec<UserId>;

    /// All movie ids, ascending
    fn movie_ids(&self) -> Vec<MovieId>;

    /// Current rating rows referencing a movie (empty for unknown movies)
    fn ratings_for_movie(&self, movie_id: MovieId) -> Vec<Rating>;

    /// Movies the user rated at or above `threshold`
    fn liked_movies(&self, user_id: UserId, threshold: f32) -> HashSet<MovieId>;

    /// (genre, co-occurrence count) over the given movies.
    ///
    /// Ordered by count descending, ties by genre id ascending.
    fn genre_counts(&self, movie_ids: &HashSet<MovieId>) -> Vec<(GenreId, u32)>;

    /// (tag, co-occurrence count) over the given movies, same ordering as `genre_counts`
    fn tag_counts(&self, movie_ids: &HashSet<MovieId>) -> Vec<(TagId, u32)>;

    /// Every movie not in `excluding`, ascending by id
    fn candidate_movies(&self, excluding: &HashSet<MovieId>) -> Vec<CandidateMovie>;

    fn movie_stats(&self, movie_id: MovieId) -> Option<MovieStats>;

    fn recommendation_cache(&self, user_id: UserId) -> Option<RecommendationCache>;

    fn embedding(
        &self,
        object_type: ObjectType,
        object_id: ObjectId,
        model_version: &str,
    ) -> Option<Embedding>;

    /// All embeddings of one object type under one model version
    fn embeddings(&self, object_type: ObjectType, model_version: &str) -> Vec<Embedding>;

    /// (movie, event count) over events of `kind` at or after `since`.
    ///
    /// Events without a movie are ignored. Ordered by count descending, ties
    /// by movie id ascending.
    fn event_counts(&self, kind: EventKind, since: i64) -> Vec<(MovieId, u32)>;
}

/// Write side of the dataset.
///
/// Each method is a single-row write; atomicity across a read-then-write
/// sequence is the caller's lock scope.
pub trait DatasetWriter: Dataset {
    /// Overwrite a movie's aggregate fields.
    ///
    /// Returns `false` (and writes nothing) when the movie no longer exists.
    fn write_movie_stats(&mut self, movie_id: MovieId, stats: MovieStats) -> bool;

    /// Create or replace the rating for (user, movie). Returns the replaced row.
    fn upsert_rating(&mut self, rating: Rating) -> Result<Option<Rating>>;

    /// Delete the rating for (user, movie). Returns the deleted row.
    fn delete_rating(&mut self, user_id: UserId, movie_id: MovieId) -> Result<Option<Rating>>;

    /// Replace the user's cache row wholesale
    fn put_recommendation_cache(&mut self, cache: RecommendationCache);

    /// Append an interaction event. Referenced user and movie must exist.
    fn record_event(&mut self, event: Event) -> Result<()>;
}
