//! Aggregate maintainer for the denormalized per-movie statistics.
//!
//! `avg_rating` and `rating_count` are always recomputed from the full,
//! current rating set of a movie rather than adjusted incrementally, so every
//! recompute is idempotent and repairs any earlier drift. This module is the
//! only writer of `MovieStats`.
//!
//! Every rating mutation goes through [`rate`] or [`unrate`], which run the
//! recompute for the touched movie while the caller still holds the store
//! exclusively. There are no implicit hooks.

use crate::error::{DataError, Result};
use crate::query::DatasetWriter;
use crate::types::{MovieId, MovieStats, Rating, UserId, is_valid_score};
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

/// Arithmetic mean and count of a rating set. Empty sets yield `(0.0, 0)`.
pub fn aggregate_ratings(ratings: &[Rating]) -> MovieStats {
    if ratings.is_empty() {
        return MovieStats::default();
    }
    let total: f64 = ratings.iter().map(|r| r.rating as f64).sum();
    let rating_count = ratings.len() as u32;
    MovieStats {
        avg_rating: (total / rating_count as f64) as f32,
        rating_count,
    }
}

/// Recompute and persist the aggregates of a single movie.
///
/// Returns the written stats, or `None` when the movie no longer exists
/// (a concurrent delete is not an error).
#[instrument(skip(data))]
pub fn recompute_movie_aggregate<D>(data: &mut D, movie_id: MovieId) -> Option<MovieStats>
where
    D: DatasetWriter + ?Sized,
{
    let stats = aggregate_ratings(&data.ratings_for_movie(movie_id));
    if data.write_movie_stats(movie_id, stats) {
        debug!(
            avg_rating = stats.avg_rating,
            rating_count = stats.rating_count,
            "recomputed movie aggregate"
        );
        Some(stats)
    } else {
        debug!("movie vanished before recompute, skipping");
        None
    }
}

/// Hook to run after any create, update or delete of a rating
pub fn on_rating_changed<D>(data: &mut D, movie_id: MovieId)
where
    D: DatasetWriter + ?Sized,
{
    recompute_movie_aggregate(data, movie_id);
}

/// Recompute the aggregates of every movie in one pass.
///
/// Aggregates are computed in parallel and then written one movie at a time;
/// a movie whose write fails is logged and skipped. Produces exactly what
/// [`recompute_movie_aggregate`] would for each movie. Returns the number of
/// movies updated.
#[instrument(skip(data))]
pub fn recompute_all_aggregates<D>(data: &mut D) -> usize
where
    D: DatasetWriter,
{
    let movie_ids = data.movie_ids();
    let shared: &D = data;
    let computed: Vec<(MovieId, MovieStats)> = movie_ids
        .par_iter()
        .map(|&movie_id| (movie_id, aggregate_ratings(&shared.ratings_for_movie(movie_id))))
        .collect();

    let mut updated = 0;
    for (movie_id, stats) in computed {
        if data.write_movie_stats(movie_id, stats) {
            updated += 1;
        } else {
            warn!(movie_id, "could not write aggregate, skipping");
        }
    }
    info!("Recomputed aggregates for {} movies", updated);
    updated
}

/// Create or replace a user's rating, then recompute the movie's aggregates.
///
/// Returns the movie's stats after the write.
#[instrument(skip(data))]
pub fn rate<D>(
    data: &mut D,
    user_id: UserId,
    movie_id: MovieId,
    score: f32,
    timestamp: i64,
) -> Result<MovieStats>
where
    D: DatasetWriter + ?Sized,
{
    if !is_valid_score(score) {
        return Err(DataError::InvalidInput(format!(
            "rating {} outside [0, 5]",
            score
        )));
    }
    let previous = data.upsert_rating(Rating {
        user_id,
        movie_id,
        rating: score,
        timestamp,
    })?;
    if let Some(previous) = previous {
        debug!(previous = previous.rating, "replaced existing rating");
    }
    recompute_movie_aggregate(data, movie_id)
        .ok_or_else(|| DataError::not_found("Movie", movie_id))
}

/// Delete a user's rating, then recompute the movie's aggregates.
///
/// Returns `false` when there was no rating to delete. The recompute runs
/// either way so stale stats are repaired.
#[instrument(skip(data))]
pub fn unrate<D>(data: &mut D, user_id: UserId, movie_id: MovieId) -> Result<bool>
where
    D: DatasetWriter + ?Sized,
{
    let removed = data.delete_rating(user_id, movie_id)?;
    on_rating_changed(data, movie_id);
    Ok(removed.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Dataset;
    use crate::types::{DataIndex, Movie, User};

    fn create_test_index() -> DataIndex {
        let mut index = DataIndex::new();
        for id in 1..=4 {
            index.insert_user(User {
                id,
                username: format!("user{}", id),
            });
        }
        index.insert_movie(Movie::new(1, "Heat"));
        index.insert_movie(Movie::new(2, "Ronin"));
        index
    }

    #[test]
    fn test_aggregate_empty() {
        assert_eq!(aggregate_ratings(&[]), MovieStats::default());
    }

    #[test]
    fn test_mean_and_count() {
        let mut index = create_test_index();
        rate(&mut index, 1, 1, 5.0, 1).unwrap();
        rate(&mut index, 2, 1, 4.0, 2).unwrap();
        let stats = rate(&mut index, 3, 1, 2.5, 3).unwrap();

        assert_eq!(stats.rating_count, 3);
        assert!((stats.avg_rating - 11.5 / 3.0).abs() < 1e-6);
        assert_eq!(index.get_movie_stats(1), Some(&stats));
    }

    #[test]
    fn test_rerate_replaces() {
        let mut index = create_test_index();
        rate(&mut index, 1, 1, 1.0, 1).unwrap();
        let stats = rate(&mut index, 1, 1, 3.0, 2).unwrap();
        assert_eq!(stats.rating_count, 1);
        assert_eq!(stats.avg_rating, 3.0);
    }

    #[test]
    fn test_deleting_last_rating_resets() {
        let mut index = create_test_index();
        rate(&mut index, 1, 2, 4.0, 1).unwrap();
        rate(&mut index, 2, 2, 2.0, 1).unwrap();

        assert!(unrate(&mut index, 1, 2).unwrap());
        assert!(unrate(&mut index, 2, 2).unwrap());
        assert!(!unrate(&mut index, 2, 2).unwrap());

        let stats = index.get_movie_stats(2).copied().unwrap();
        assert_eq!(stats.avg_rating, 0.0);
        assert_eq!(stats.rating_count, 0);
    }

    #[test]
    fn test_unrate_removes_row_and_stats_together() {
        let mut index = create_test_index();
        rate(&mut index, 1, 1, 5.0, 0).unwrap();

        assert!(unrate(&mut index, 1, 1).unwrap());
        assert!(index.ratings_for_movie(1).is_empty());
        assert!(index.get_user_ratings(1).is_empty());
        assert_eq!(index.movie_stats(1), Some(MovieStats::default()));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut index = create_test_index();
        rate(&mut index, 1, 1, 4.5, 1).unwrap();
        rate(&mut index, 2, 1, 3.5, 1).unwrap();

        let first = recompute_movie_aggregate(&mut index, 1);
        let second = recompute_movie_aggregate(&mut index, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_recompute_repairs_drift() {
        let mut index = create_test_index();
        rate(&mut index, 1, 1, 4.0, 1).unwrap();
        index.write_movie_stats(
            1,
            MovieStats {
                avg_rating: 1.0,
                rating_count: 99,
            },
        );
        let stats = recompute_movie_aggregate(&mut index, 1).unwrap();
        assert_eq!(stats.rating_count, 1);
        assert_eq!(stats.avg_rating, 4.0);
    }

    #[test]
    fn test_recompute_deleted_movie_is_noop() {
        let mut index = create_test_index();
        rate(&mut index, 1, 1, 4.0, 1).unwrap();
        index.remove_movie(1);
        assert_eq!(recompute_movie_aggregate(&mut index, 1), None);
        assert!(index.get_movie_stats(1).is_none());
    }

    #[test]
    fn test_batch_matches_single_recompute() {
        let mut index = create_test_index();
        // Ratings inserted without the maintainer, so stats are missing
        for (user_id, movie_id, rating) in [(1, 1, 5.0), (2, 1, 3.0), (3, 2, 4.0)] {
            index.insert_rating(Rating {
                user_id,
                movie_id,
                rating,
                timestamp: 0,
            });
        }
        let updated = recompute_all_aggregates(&mut index);
        assert_eq!(updated, 2);

        let batch: Vec<_> = index.movie_ids().iter().map(|&id| index.movie_stats(id)).collect();
        let single: Vec<_> = index
            .movie_ids()
            .into_iter()
            .map(|id| recompute_movie_aggregate(&mut index, id))
            .collect();
        assert_eq!(batch, single);
    }

    #[test]
    fn test_rate_rejects_out_of_range() {
        let mut index = create_test_index();
        assert!(matches!(
            rate(&mut index, 1, 1, -0.5, 0),
            Err(DataError::InvalidInput(_))
        ));
        assert!(index.get_movie_stats(1).is_none());
    }

    #[test]
    fn test_rate_unknown_movie() {
        let mut index = create_test_index();
        let err = rate(&mut index, 1, 77, 3.0, 0).unwrap_err();
        assert!(err.is_not_found());
    }
}
