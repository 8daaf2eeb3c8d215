//! Query and write primitives of the in-memory `DataIndex`.
//!
//! This is where the `Dataset` and `DatasetWriter` traits meet the HashMap
//! indices: group-by counting over genre/tag references, liked-set filters,
//! candidate projection and the single-row writes the core is allowed to make.
//! `validate` checks referential integrity after a snapshot load.

use crate::error::{DataError, Result};
use crate::query::{Dataset, DatasetWriter};
use crate::types::*;
use std::collections::{HashMap, HashSet};
use tracing::warn;

impl Dataset for DataIndex {
    fn has_user(&self, user_id: UserId) -> bool {
        self.users.contains_key(&user_id)
    }

    fn has_movie(&self, movie_id: MovieId) -> bool {
        self.movies.contains_key(&movie_id)
    }

    fn user_ids(&self) -> Vec<UserId> {
        self.get_all_user_ids()
    }

    fn movie_ids(&self) -> Vec<MovieId> {
        self.get_all_movie_ids()
    }

    fn ratings_for_movie(&self, movie_id: MovieId) -> Vec<Rating> {
        self.get_movie_ratings(movie_id).to_vec()
    }

    fn liked_movies(&self, user_id: UserId, threshold: f32) -> HashSet<MovieId> {
        self.get_user_ratings(user_id)
            .iter()
            .filter(|r| r.rating >= threshold)
            .map(|r| r.movie_id)
            .collect()
    }

    fn genre_counts(&self, movie_ids: &HashSet<MovieId>) -> Vec<(GenreId, u32)> {
        count_labels(movie_ids, |id| {
            self.movies.get(&id).map(|m| m.genre_ids.as_slice())
        })
    }

    fn tag_counts(&self, movie_ids: &HashSet<MovieId>) -> Vec<(TagId, u32)> {
        count_labels(movie_ids, |id| {
            self.movies.get(&id).map(|m| m.tag_ids.as_slice())
        })
    }

    fn candidate_movies(&self, excluding: &HashSet<MovieId>) -> Vec<CandidateMovie> {
        let mut candidates: Vec<CandidateMovie> = self
            .movies
            .values()
            .filter(|movie| !excluding.contains(&movie.id))
            .map(|movie| CandidateMovie {
                id: movie.id,
                title: movie.title.clone(),
                stats: self.movie_stats.get(&movie.id).copied(),
                popularity: movie.popularity,
                vote_average: movie.vote_average,
                genre_ids: movie.genre_ids.clone(),
                tag_ids: movie.tag_ids.clone(),
            })
            .collect();
        candidates.sort_unstable_by_key(|c| c.id);
        candidates
    }

    fn movie_stats(&self, movie_id: MovieId) -> Option<MovieStats> {
        self.movie_stats.get(&movie_id).copied()
    }

    fn recommendation_cache(&self, user_id: UserId) -> Option<RecommendationCache> {
        self.rec_cache.get(&user_id).cloned()
    }

    fn embedding(
        &self,
        object_type: ObjectType,
        object_id: ObjectId,
        model_version: &str,
    ) -> Option<Embedding> {
        let key = EmbeddingKey {
            object_type,
            object_id,
            model_version: model_version.to_string(),
        };
        self.embeddings.get(&key).cloned()
    }

    fn embeddings(&self, object_type: ObjectType, model_version: &str) -> Vec<Embedding> {
        let mut found: Vec<Embedding> = self
            .embeddings
            .values()
            .filter(|e| e.object_type == object_type && e.model_version == model_version)
            .cloned()
            .collect();
        found.sort_unstable_by_key(|e| e.object_id);
        found
    }

    fn event_counts(&self, kind: EventKind, since: i64) -> Vec<(MovieId, u32)> {
        let mut counts: HashMap<MovieId, u32> = HashMap::new();
        for event in &self.events {
            if event.kind != kind || event.timestamp < since {
                continue;
            }
            if let Some(movie_id) = event.movie_id {
                *counts.entry(movie_id).or_insert(0) += 1;
            }
        }

        let mut ordered: Vec<(MovieId, u32)> = counts.into_iter().collect();
        ordered.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ordered
    }
}

impl DatasetWriter for DataIndex {
    fn write_movie_stats(&mut self, movie_id: MovieId, stats: MovieStats) -> bool {
        if !self.movies.contains_key(&movie_id) {
            return false;
        }
        self.movie_stats.insert(movie_id, stats);
        true
    }

    fn upsert_rating(&mut self, rating: Rating) -> Result<Option<Rating>> {
        if !is_valid_score(rating.rating) {
            return Err(DataError::InvalidInput(format!(
                "rating {} outside [{}, {}]",
                rating.rating, MIN_RATING, MAX_RATING
            )));
        }
        if !self.users.contains_key(&rating.user_id) {
            return Err(DataError::not_found("User", rating.user_id));
        }
        if !self.movies.contains_key(&rating.movie_id) {
            return Err(DataError::not_found("Movie", rating.movie_id));
        }
        Ok(self.insert_rating(rating))
    }

    fn delete_rating(&mut self, user_id: UserId, movie_id: MovieId) -> Result<Option<Rating>> {
        if !self.users.contains_key(&user_id) {
            return Err(DataError::not_found("User", user_id));
        }
        Ok(self.remove_rating(user_id, movie_id))
    }

    fn put_recommendation_cache(&mut self, cache: RecommendationCache) {
        self.rec_cache.insert(cache.user_id, cache);
    }

    fn record_event(&mut self, event: Event) -> Result<()> {
        self.check_event_refs(&event)?;
        self.events.push(event);
        Ok(())
    }
}

/// Count (label, movie) co-occurrences and order by count desc, label id asc.
///
/// A label repeated on one movie counts once for that movie.
fn count_labels<'a, F>(movie_ids: &HashSet<MovieId>, labels_of: F) -> Vec<(u32, u32)>
where
    F: Fn(MovieId) -> Option<&'a [u32]>,
{
    let mut counts: HashMap<u32, u32> = HashMap::new();
    for &movie_id in movie_ids {
        let Some(labels) = labels_of(movie_id) else {
            continue;
        };
        let distinct: HashSet<u32> = labels.iter().copied().collect();
        for label in distinct {
            *counts.entry(label).or_insert(0) += 1;
        }
    }

    let mut ordered: Vec<(u32, u32)> = counts.into_iter().collect();
    ordered.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ordered
}

impl DataIndex {
    fn check_event_refs(&self, event: &Event) -> Result<()> {
        if let Some(user_id) = event.user_id {
            if !self.users.contains_key(&user_id) {
                return Err(DataError::not_found("User", user_id));
            }
        }
        if let Some(movie_id) = event.movie_id {
            if !self.movies.contains_key(&movie_id) {
                return Err(DataError::not_found("Movie", movie_id));
            }
        }
        Ok(())
    }

    /// Validate data integrity
    ///
    /// Check that:
    /// - All rating.user_id / rating.movie_id references exist
    /// - Ratings are in valid range (0.0 - 5.0)
    /// - Movie genre/tag references exist
    /// - Event user/movie references exist
    /// - Embedding dims match their vectors
    ///
    /// Missing or stale aggregate rows are only logged; a recompute repairs them.
    pub fn validate(&self) -> Result<()> {
        for ratings in self.user_ratings.values() {
            for rating in ratings {
                if !self.users.contains_key(&rating.user_id) {
                    return Err(DataError::not_found("User", rating.user_id));
                }
                if !self.movies.contains_key(&rating.movie_id) {
                    return Err(DataError::not_found("Movie", rating.movie_id));
                }
                if !is_valid_score(rating.rating) {
                    return Err(DataError::InvalidInput(format!(
                        "rating {} by user {} for movie {} outside [{}, {}]",
                        rating.rating, rating.user_id, rating.movie_id, MIN_RATING, MAX_RATING
                    )));
                }
            }
        }

        for movie in self.movies.values() {
            if let Some(missing) = movie.genre_ids.iter().find(|g| !self.genres.contains_key(*g)) {
                return Err(DataError::inconsistency(
                    "Movie",
                    movie.id,
                    format!("unknown genre {}", missing),
                ));
            }
            if let Some(missing) = movie.tag_ids.iter().find(|t| !self.tags.contains_key(*t)) {
                return Err(DataError::inconsistency(
                    "Movie",
                    movie.id,
                    format!("unknown tag {}", missing),
                ));
            }
            let actual = self.get_movie_ratings(movie.id).len();
            match self.movie_stats.get(&movie.id) {
                None => warn!(movie_id = movie.id, "movie has no aggregate row"),
                Some(stats) if stats.rating_count as usize != actual => warn!(
                    movie_id = movie.id,
                    stored = stats.rating_count,
                    actual,
                    "aggregate rating_count disagrees with ratings"
                ),
                Some(_) => {}
            }
        }

        for event in &self.events {
            self.check_event_refs(event)?;
        }

        for embedding in self.embeddings.values() {
            if embedding.dim != embedding.vector.len() {
                return Err(DataError::inconsistency(
                    "Embedding",
                    embedding.object_id,
                    format!(
                        "declared dim {} but vector has {} values",
                        embedding.dim,
                        embedding.vector.len()
                    ),
                ));
            }
        }
        Ok(())
    }
}
