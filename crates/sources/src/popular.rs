//! Popular Source - non-personalized fallback ranking
//!
//! Ranks the whole catalog by quality alone, for anonymous or unknown users.
//! This is a separate, explicitly named path: the personalized recommender
//! never falls back to it on its own.
//!
//! ## Ordering
//! 1. avg_rating descending
//! 2. rating_count descending
//! 3. title ascending
//! 4. movie id ascending

use data_loader::{CandidateMovie, Dataset, MovieId, MovieStats};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// Top `k` movies by average rating, then rating count
#[instrument(skip(data))]
pub fn popular<D>(data: &D, k: usize) -> Vec<MovieId>
where
    D: Dataset + ?Sized,
{
    let mut movies = data.candidate_movies(&HashSet::new());
    let missing = movies.iter().filter(|m| m.stats.is_none()).count();
    if missing > 0 {
        warn!(missing, "movies have no aggregate row, ranking them as zero");
    }

    movies.sort_by(compare_popularity);
    movies.truncate(k);

    debug!("Selected {} popular movies", movies.len());
    movies.into_iter().map(|m| m.id).collect()
}

fn compare_popularity(a: &CandidateMovie, b: &CandidateMovie) -> Ordering {
    let sa = a.stats.unwrap_or_default();
    let sb = b.stats.unwrap_or_default();
    compare_stats(&sa, &sb)
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.id.cmp(&b.id))
}

/// Higher avg_rating first, then higher rating_count
fn compare_stats(a: &MovieStats, b: &MovieStats) -> Ordering {
    b.avg_rating
        .total_cmp(&a.avg_rating)
        .then_with(|| b.rating_count.cmp(&a.rating_count))
}
