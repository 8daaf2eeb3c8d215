//! Trending Source - what users are clicking right now
//!
//! Ranks movies by the number of click events inside a time window. Like
//! `popular`, this ignores the caller's taste and is never mixed into the
//! personalized ranking.

use data_loader::{Dataset, EventKind, MovieId};
use tracing::{debug, instrument};

/// Seconds in one day, for converting a window in days to a cutoff
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Top `k` movies by clicks at or after `since` (unix seconds).
///
/// Returns `(movie_id, clicks)`, most clicked first, ties by movie id ascending.
/// Movies without clicks in the window are not listed.
#[instrument(skip(data))]
pub fn trending<D>(data: &D, since: i64, k: usize) -> Vec<(MovieId, u32)>
where
    D: Dataset + ?Sized,
{
    let mut ranked = data.event_counts(EventKind::Click, since);
    ranked.truncate(k);
    debug!("Selected {} trending movies", ranked.len());
    ranked
}

/// Cutoff timestamp for a window of `days` ending at `now`
pub fn window_start(now: i64, days: u32) -> i64 {
    now.saturating_sub(i64::from(days) * SECONDS_PER_DAY)
}
