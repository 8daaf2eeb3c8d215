//! # Recommendation Orchestrator
//!
//! Async façade over one shared, lock-guarded `DataIndex`. It exposes every
//! engine operation to callers (CLI, batch jobs, an API layer):
//! - personalized scoring (`recommend`, `explain`) and the `popular` fallback
//! - the cache-backed path (`get_or_build_cache`) and batch cache rebuilds
//! - the rating write path with its aggregate recompute
//! - full-table aggregate repair
//! - the interaction event log and the `trending` ranking built on it
//! - embedding similarity
//!
//! ## Locking
//! All store access runs on `spawn_blocking`. Scoring holds a read guard.
//! Rating writes hold the write guard across write, read of the movie's
//! ratings and stats overwrite, so concurrent ratings of one movie cannot
//! lose updates. Cache writes take the write guard for a single user's row
//! at a time.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use data_loader::{
    DataError, DataIndex, Dataset, DatasetWriter, Event, EventKind, MovieId, MovieStats, ObjectId,
    ObjectType, RecommendationCache, UserId, aggregates,
};
use pipeline::{Recommender, ScoredCandidate};

use crate::config::EngineConfig;

/// One ranked movie with the inputs that produced its score
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecommendation {
    pub movie_id: MovieId,
    pub title: String,
    pub year: Option<u16>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub score: f64,
    pub avg_rating: f32,
    pub rating_count: u32,
    pub shared_genres: u32,
    pub shared_tags: u32,
    pub explanation: String,
}

/// Main orchestrator that coordinates the engine components
#[derive(Clone)]
pub struct RecommendationOrchestrator {
    data_index: Arc<RwLock<DataIndex>>,
    recommender: Recommender,
    config: Arc<EngineConfig>,
}

impl RecommendationOrchestrator {
    /// Take ownership of a loaded index
    pub fn new(data_index: DataIndex, config: EngineConfig) -> Self {
        Self::with_shared_index(Arc::new(RwLock::new(data_index)), config)
    }

    /// Share an index that other components also hold
    pub fn with_shared_index(data_index: Arc<RwLock<DataIndex>>, config: EngineConfig) -> Self {
        let recommender = config.recommender();
        Self {
            data_index,
            recommender,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn data_index(&self) -> Arc<RwLock<DataIndex>> {
        self.data_index.clone()
    }

    /// Run `f` against the store under a read guard on the blocking pool
    pub async fn with_read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&DataIndex) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let data_index = self.data_index.clone();
        tokio::task::spawn_blocking(move || {
            let guard = read_index(&data_index)?;
            f(&guard)
        })
        .await
        .context("Read task panicked")?
    }

    /// Run `f` against the store under the write guard on the blocking pool
    async fn with_write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut DataIndex) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let data_index = self.data_index.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = write_index(&data_index)?;
            f(&mut guard)
        })
        .await
        .context("Write task panicked")?
    }

    // ========================================================================
    // Scoring
    // ========================================================================

    /// Up to `k` movie ids for `user_id`, best first
    #[instrument(skip(self))]
    pub async fn recommend(&self, user_id: UserId, k: usize) -> Result<Vec<MovieId>> {
        let recommender = self.recommender;
        self.with_read(move |index| {
            recommender
                .recommend(index, user_id, k)
                .with_context(|| format!("Failed to recommend for user {}", user_id))
        })
        .await
    }

    /// Same ranking as `recommend`, enriched with metadata and the score breakdown
    #[instrument(skip(self))]
    pub async fn explain(&self, user_id: UserId, k: usize) -> Result<Vec<MovieRecommendation>> {
        let recommender = self.recommender;
        self.with_read(move |index| {
            let explanation = recommender
                .explain(index, user_id, k)
                .with_context(|| format!("Failed to explain recommendations for user {}", user_id))?;
            Ok(explanation
                .ranked
                .into_iter()
                .filter_map(|candidate| to_recommendation(index, candidate))
                .collect())
        })
        .await
    }

    /// Non-personalized fallback for anonymous or unknown users
    #[instrument(skip(self))]
    pub async fn popular(&self, k: usize) -> Result<Vec<MovieId>> {
        self.with_read(move |index| Ok(sources::popular(index, k))).await
    }

    // ========================================================================
    // Recommendation cache
    // ========================================================================

    /// Stored list for the user if one exists, otherwise build, persist and return it.
    ///
    /// A stored list is returned verbatim without any scoring, however stale.
    /// Rebuild explicitly to refresh it.
    #[instrument(skip(self))]
    pub async fn get_or_build_cache(&self, user_id: UserId) -> Result<Vec<MovieId>> {
        let cached = self
            .with_read(move |index| Ok(index.recommendation_cache(user_id)))
            .await?;
        if let Some(cache) = cached {
            debug!(model_version = %cache.model_version, "cache hit");
            return Ok(cache.items);
        }

        debug!("cache miss, building");
        let items = self.recommend(user_id, self.config.default_k).await?;
        let cache = self.cache_row(user_id, items.clone());
        self.with_write(move |index| {
            index.put_recommendation_cache(cache);
            Ok(())
        })
        .await?;
        Ok(items)
    }

    /// Recompute and overwrite the cache rows of the given users.
    ///
    /// Users are processed in ascending id order; duplicates count once.
    /// A user that cannot be scored is logged and skipped. Returns the number
    /// of rows written.
    #[instrument(skip(self, user_ids), fields(users = user_ids.len()))]
    pub async fn rebuild_cache_for_users(&self, user_ids: &[UserId], k: usize) -> Result<usize> {
        let start = Instant::now();
        let mut user_ids = user_ids.to_vec();
        user_ids.sort_unstable();
        user_ids.dedup();

        let recommender = self.recommender;
        let results: Vec<(UserId, data_loader::Result<Vec<MovieId>>)> = self
            .with_read(move |index| {
                Ok(user_ids
                    .par_iter()
                    .map(|&user_id| (user_id, recommender.recommend(index, user_id, k)))
                    .collect())
            })
            .await?;

        let data_index = self.data_index.clone();
        let model_version = self.config.model_version.clone();
        let rebuilt = tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut rebuilt = 0;
            for (user_id, result) in results {
                match result {
                    Ok(items) => {
                        write_index(&data_index)?.put_recommendation_cache(RecommendationCache {
                            user_id,
                            items,
                            model_version: model_version.clone(),
                        });
                        rebuilt += 1;
                    }
                    Err(err) => warn!(user_id, error = %err, "skipping cache rebuild"),
                }
            }
            Ok(rebuilt)
        })
        .await
        .context("Cache rebuild task panicked")??;

        info!("Rebuilt {} cache rows in {:?}", rebuilt, start.elapsed());
        Ok(rebuilt)
    }

    /// Rebuild the cache of every known user, optionally only the first `limit_users`
    #[instrument(skip(self))]
    pub async fn rebuild_cache_for_all(&self, k: usize, limit_users: Option<usize>) -> Result<usize> {
        let mut user_ids = self.with_read(|index| Ok(index.user_ids())).await?;
        if let Some(limit) = limit_users {
            user_ids.truncate(limit);
        }
        self.rebuild_cache_for_users(&user_ids, k).await
    }

    fn cache_row(&self, user_id: UserId, items: Vec<MovieId>) -> RecommendationCache {
        RecommendationCache {
            user_id,
            items,
            model_version: self.config.model_version.clone(),
        }
    }

    // ========================================================================
    // Rating write path and aggregates
    // ========================================================================

    /// Create or replace a rating and recompute the movie's aggregates atomically
    #[instrument(skip(self))]
    pub async fn rate(&self, user_id: UserId, movie_id: MovieId, score: f32) -> Result<MovieStats> {
        let timestamp = unix_now();
        self.with_write(move |index| {
            aggregates::rate(index, user_id, movie_id, score, timestamp)
                .with_context(|| format!("Failed to rate movie {} for user {}", movie_id, user_id))
        })
        .await
    }

    /// Delete a rating and recompute the movie's aggregates atomically.
    ///
    /// Returns `false` when the user had not rated the movie.
    #[instrument(skip(self))]
    pub async fn unrate(&self, user_id: UserId, movie_id: MovieId) -> Result<bool> {
        self.with_write(move |index| {
            aggregates::unrate(index, user_id, movie_id).with_context(|| {
                format!("Failed to remove rating of movie {} by user {}", movie_id, user_id)
            })
        })
        .await
    }

    /// Recompute one movie's aggregates. `None` when the movie does not exist.
    #[instrument(skip(self))]
    pub async fn recompute_movie_aggregate(&self, movie_id: MovieId) -> Result<Option<MovieStats>> {
        self.with_write(move |index| Ok(aggregates::recompute_movie_aggregate(index, movie_id)))
            .await
    }

    /// Recompute every movie's aggregates; returns the number of movies updated
    #[instrument(skip(self))]
    pub async fn recompute_all_aggregates(&self) -> Result<usize> {
        self.with_write(|index| Ok(aggregates::recompute_all_aggregates(index)))
            .await
    }

    // ========================================================================
    // Interaction events
    // ========================================================================

    /// Append an interaction event stamped with the current time
    #[instrument(skip(self))]
    pub async fn record_event(
        &self,
        user_id: Option<UserId>,
        movie_id: Option<MovieId>,
        kind: EventKind,
    ) -> Result<Event> {
        let event = Event::new(user_id, movie_id, kind, unix_now());
        self.with_write(move |index| {
            index
                .record_event(event.clone())
                .with_context(|| format!("Failed to record {} event", kind))?;
            Ok(event)
        })
        .await
    }

    /// Most clicked movies over the last `window_days` days, with their click counts
    #[instrument(skip(self))]
    pub async fn trending(&self, window_days: u32, k: usize) -> Result<Vec<(MovieId, u32)>> {
        self.trending_at(unix_now(), window_days, k).await
    }

    async fn trending_at(&self, now: i64, window_days: u32, k: usize) -> Result<Vec<(MovieId, u32)>> {
        let since = sources::window_start(now, window_days);
        self.with_read(move |index| Ok(sources::trending(index, since, k)))
            .await
    }

    // ========================================================================
    // Similarity
    // ========================================================================

    /// The `k` objects most similar to `object_id` under `model_version`
    /// (the configured embedding model when `None`)
    #[instrument(skip(self))]
    pub async fn similar_items(
        &self,
        object_type: ObjectType,
        object_id: ObjectId,
        model_version: Option<String>,
        k: usize,
    ) -> Result<Vec<(ObjectId, f32)>> {
        let model_version =
            model_version.unwrap_or_else(|| self.config.embedding_model_version.clone());
        self.with_read(move |index| {
            sources::similar_items(index, object_type, object_id, &model_version, k).with_context(
                || format!("Failed to find items similar to {} {}", object_type, object_id),
            )
        })
        .await
    }

    /// Write the current store to a JSON snapshot
    pub async fn save_snapshot(&self, path: std::path::PathBuf) -> Result<()> {
        self.with_read(move |index| {
            index
                .save_snapshot(&path)
                .with_context(|| format!("Failed to save snapshot {}", path.display()))
        })
        .await
    }
}

/// True when `err` was caused by an unknown user, movie or embedding
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<DataError>()
            .is_some_and(DataError::is_not_found)
    })
}

fn read_index(data_index: &RwLock<DataIndex>) -> Result<RwLockReadGuard<'_, DataIndex>> {
    data_index
        .read()
        .map_err(|_| anyhow!("data index lock poisoned"))
}

fn write_index(data_index: &RwLock<DataIndex>) -> Result<RwLockWriteGuard<'_, DataIndex>> {
    data_index
        .write()
        .map_err(|_| anyhow!("data index lock poisoned"))
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn to_recommendation(index: &DataIndex, candidate: ScoredCandidate) -> Option<MovieRecommendation> {
    let movie = index.get_movie(candidate.features.movie_id)?;
    let f = candidate.features;
    Some(MovieRecommendation {
        movie_id: f.movie_id,
        title: movie.title.clone(),
        year: movie.release_year,
        genres: index.genre_names_of(movie),
        tags: index.tag_names_of(movie),
        score: candidate.score,
        avg_rating: f.avg_rating,
        rating_count: f.rating_count,
        shared_genres: f.shared_genres,
        shared_tags: f.shared_tags,
        explanation: format!(
            "{} shared genres, {} shared tags, avg {:.2} over {} ratings",
            f.shared_genres, f.shared_tags, f.avg_rating, f.rating_count
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Embedding, Movie, User};

    // ============================================================================
    // Test Fixtures
    // ============================================================================

    const ALICE: UserId = 1;
    const NEWCOMER: UserId = 2;

    /// Alice likes two dramas; movie 3 is a drama, movie 4 a comedy
    fn build_test_data_index() -> DataIndex {
        let mut index = DataIndex::new();

        index.insert_user(User {
            id: ALICE,
            username: "alice".to_string(),
        });
        index.insert_user(User {
            id: NEWCOMER,
            username: "newcomer".to_string(),
        });
        for id in 10..20 {
            index.insert_user(User {
                id,
                username: format!("rater{}", id),
            });
        }

        let drama = index.get_or_insert_genre("Drama");
        let comedy = index.get_or_insert_genre("Comedy");
        let twist = index.get_or_insert_tag("twist");

        let mut m1 = Movie::new(1, "The Shawshank Redemption");
        m1.genre_ids = vec![drama];
        m1.release_year = Some(1994);
        let mut m2 = Movie::new(2, "Fight Club");
        m2.genre_ids = vec![drama];
        m2.tag_ids = vec![twist];
        let mut m3 = Movie::new(3, "Forrest Gump");
        m3.genre_ids = vec![drama];
        m3.tag_ids = vec![twist];
        let mut m4 = Movie::new(4, "Toy Story");
        m4.genre_ids = vec![comedy];
        for movie in [m1, m2, m3, m4] {
            index.insert_movie(movie);
        }

        aggregates::rate(&mut index, ALICE, 1, 5.0, 0).unwrap();
        aggregates::rate(&mut index, ALICE, 2, 4.5, 0).unwrap();
        for id in 10..15 {
            aggregates::rate(&mut index, id, 3, 4.0, 0).unwrap();
        }
        for id in 15..20 {
            aggregates::rate(&mut index, id, 4, 5.0, 0).unwrap();
        }

        index.insert_embedding(Embedding::new(ObjectType::Movie, 1, "v1", vec![1.0, 0.0]));
        index.insert_embedding(Embedding::new(ObjectType::Movie, 2, "v1", vec![0.8, 0.2]));
        index.insert_embedding(Embedding::new(ObjectType::Movie, 3, "v1", vec![0.0, 1.0]));
        index.insert_embedding(Embedding::new(ObjectType::Movie, 4, "v1", vec![0.0, 0.0]));

        aggregates::recompute_all_aggregates(&mut index);
        index
    }

    fn build_test_orchestrator() -> RecommendationOrchestrator {
        RecommendationOrchestrator::new(build_test_data_index(), EngineConfig::default())
    }

    fn data_error(err: &anyhow::Error) -> Option<&DataError> {
        err.chain().find_map(|cause| cause.downcast_ref::<DataError>())
    }

    // ============================================================================
    // Scoring
    // ============================================================================

    #[tokio::test]
    async fn test_recommend_matches_scorer() {
        let orchestrator = build_test_orchestrator();
        let expected = Recommender::default()
            .recommend(&build_test_data_index(), ALICE, 10)
            .unwrap();

        let recs = orchestrator.recommend(ALICE, 10).await.unwrap();
        assert_eq!(recs, expected);
        // Liked movies excluded, shared drama+twist ranks first
        assert_eq!(recs, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_recommend_unknown_user_is_not_found() {
        let orchestrator = build_test_orchestrator();
        let err = orchestrator.recommend(9999, 10).await.unwrap_err();
        assert!(is_not_found(&err));
        assert!(matches!(
            data_error(&err),
            Some(DataError::NotFound { id: 9999, .. })
        ));
    }

    #[tokio::test]
    async fn test_cold_user_gets_quality_ranking() {
        let orchestrator = build_test_orchestrator();
        let recs = orchestrator.recommend(NEWCOMER, 10).await.unwrap();
        assert_eq!(recs.len(), 4);
    }

    #[tokio::test]
    async fn test_explain_enriches_with_metadata() {
        let orchestrator = build_test_orchestrator();
        let recs = orchestrator.explain(ALICE, 10).await.unwrap();

        assert_eq!(recs.len(), 2);
        let top = &recs[0];
        assert_eq!(top.movie_id, 3);
        assert_eq!(top.title, "Forrest Gump");
        assert_eq!(top.genres, vec!["Drama".to_string()]);
        assert_eq!(top.tags, vec!["twist".to_string()]);
        assert_eq!(top.shared_genres, 1);
        assert_eq!(top.shared_tags, 1);
        assert_eq!(top.rating_count, 5);
        // 0.25*4 + 0.02*5 + 0.40 + 0.23
        assert!((top.score - 1.73).abs() < 1e-6);
        assert!(top.explanation.contains("1 shared genres"));
    }

    #[tokio::test]
    async fn test_popular_fallback() {
        let orchestrator = build_test_orchestrator();
        // 4 averages 5.0 over 5 ratings; 1 averages 5.0 over 1
        assert_eq!(orchestrator.popular(3).await.unwrap(), vec![4, 1, 2]);
    }

    // ============================================================================
    // Cache
    // ============================================================================

    #[tokio::test]
    async fn test_get_or_build_cache_persists_row() {
        let orchestrator = build_test_orchestrator();

        let first = orchestrator.get_or_build_cache(ALICE).await.unwrap();
        let second = orchestrator.get_or_build_cache(ALICE).await.unwrap();
        assert_eq!(first, second);

        let row = orchestrator
            .with_read(|index| Ok(index.recommendation_cache(ALICE)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.items, first);
        assert_eq!(row.model_version, "v1");
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_rescore() {
        let orchestrator = build_test_orchestrator();
        let cached = orchestrator.get_or_build_cache(ALICE).await.unwrap();
        assert_eq!(cached, vec![3, 4]);

        // Liking movie 4 changes the live ranking
        orchestrator.rate(ALICE, 4, 5.0).await.unwrap();
        assert_eq!(orchestrator.recommend(ALICE, 50).await.unwrap(), vec![3]);

        // The stored list comes back verbatim
        assert_eq!(orchestrator.get_or_build_cache(ALICE).await.unwrap(), cached);

        // Until rebuilt explicitly
        orchestrator.rebuild_cache_for_users(&[ALICE], 50).await.unwrap();
        assert_eq!(orchestrator.get_or_build_cache(ALICE).await.unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_get_or_build_cache_unknown_user() {
        let orchestrator = build_test_orchestrator();
        let err = orchestrator.get_or_build_cache(9999).await.unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn test_rebuild_cache_for_all() {
        let orchestrator = build_test_orchestrator();
        let rebuilt = orchestrator.rebuild_cache_for_all(10, None).await.unwrap();
        assert_eq!(rebuilt, 12);

        // Cached and live results agree on the same snapshot
        for user_id in [ALICE, NEWCOMER, 10, 19] {
            let live = orchestrator.recommend(user_id, 10).await.unwrap();
            let cached = orchestrator.get_or_build_cache(user_id).await.unwrap();
            assert_eq!(cached, live);
        }
    }

    #[tokio::test]
    async fn test_rebuild_cache_limit_users() {
        let orchestrator = build_test_orchestrator();
        let rebuilt = orchestrator.rebuild_cache_for_all(10, Some(2)).await.unwrap();
        assert_eq!(rebuilt, 2);

        let cached_users = orchestrator
            .with_read(|index| {
                Ok(index
                    .user_ids()
                    .into_iter()
                    .filter(|&id| index.recommendation_cache(id).is_some())
                    .collect::<Vec<_>>())
            })
            .await
            .unwrap();
        assert_eq!(cached_users, vec![ALICE, NEWCOMER]);
    }

    #[tokio::test]
    async fn test_rebuild_skips_unknown_users() {
        let orchestrator = build_test_orchestrator();
        let rebuilt = orchestrator
            .rebuild_cache_for_users(&[ALICE, 9999, ALICE, NEWCOMER], 10)
            .await
            .unwrap();
        assert_eq!(rebuilt, 2);
    }

    // ============================================================================
    // Rating write path
    // ============================================================================

    #[tokio::test]
    async fn test_rate_updates_aggregates() {
        let orchestrator = build_test_orchestrator();

        let stats = orchestrator.rate(NEWCOMER, 3, 1.0).await.unwrap();
        assert_eq!(stats.rating_count, 6);
        assert!((stats.avg_rating - 21.0 / 6.0).abs() < 1e-6);

        // Re-rating replaces instead of adding
        let stats = orchestrator.rate(NEWCOMER, 3, 4.0).await.unwrap();
        assert_eq!(stats.rating_count, 6);
        assert!((stats.avg_rating - 4.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_rate_rejects_bad_input() {
        let orchestrator = build_test_orchestrator();

        let err = orchestrator.rate(ALICE, 3, 5.5).await.unwrap_err();
        assert!(matches!(data_error(&err), Some(DataError::InvalidInput(_))));

        let err = orchestrator.rate(ALICE, 999, 3.0).await.unwrap_err();
        assert!(is_not_found(&err));

        let err = orchestrator.rate(9999, 3, 3.0).await.unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn test_unrate_last_rating_resets_stats() {
        let orchestrator = build_test_orchestrator();

        assert!(orchestrator.unrate(ALICE, 1).await.unwrap());
        assert!(!orchestrator.unrate(ALICE, 1).await.unwrap());

        let stats = orchestrator
            .with_read(|index| Ok(index.movie_stats(1)))
            .await
            .unwrap();
        assert_eq!(stats, Some(MovieStats::default()));
    }

    #[tokio::test]
    async fn test_concurrent_ratings_on_one_movie() {
        let orchestrator = build_test_orchestrator();

        let mut handles = Vec::new();
        for id in 10..20 {
            let orchestrator = orchestrator.clone();
            handles.push(tokio::spawn(async move {
                orchestrator.rate(id, 1, 3.0).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Alice's 5.0 plus ten 3.0 ratings, none lost
        let stats = orchestrator
            .with_read(|index| Ok(index.movie_stats(1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.rating_count, 11);
        assert!((stats.avg_rating - 35.0 / 11.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_recompute_all_repairs_drift() {
        let orchestrator = build_test_orchestrator();

        orchestrator
            .with_write(|index| {
                index.write_movie_stats(
                    3,
                    MovieStats {
                        avg_rating: 1.0,
                        rating_count: 999,
                    },
                );
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(orchestrator.recompute_all_aggregates().await.unwrap(), 4);
        let stats = orchestrator.recompute_movie_aggregate(3).await.unwrap();
        assert_eq!(
            stats,
            Some(MovieStats {
                avg_rating: 4.0,
                rating_count: 5,
            })
        );
        assert_eq!(orchestrator.recompute_movie_aggregate(999).await.unwrap(), None);
    }

    // ============================================================================
    // Events
    // ============================================================================

    #[tokio::test]
    async fn test_trending_ranks_recent_clicks() {
        let orchestrator = build_test_orchestrator();

        for (user_id, movie_id) in [(Some(ALICE), 3), (None, 3), (Some(NEWCOMER), 4)] {
            orchestrator
                .record_event(user_id, Some(movie_id), EventKind::Click)
                .await
                .unwrap();
        }
        orchestrator
            .record_event(Some(ALICE), Some(1), EventKind::Impression)
            .await
            .unwrap();
        // A click from long before the window
        orchestrator
            .with_write(|index| {
                index.record_event(Event::new(None, Some(1), EventKind::Click, 0))?;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(
            orchestrator.trending(7, 20).await.unwrap(),
            vec![(3, 2), (4, 1)]
        );
        assert_eq!(orchestrator.trending(7, 1).await.unwrap(), vec![(3, 2)]);
    }

    #[tokio::test]
    async fn test_trending_window_is_relative_to_now() {
        let orchestrator = build_test_orchestrator();
        let day = sources::SECONDS_PER_DAY;
        orchestrator
            .with_write(move |index| {
                index.record_event(Event::new(None, Some(2), EventKind::Click, 100 * day))?;
                index.record_event(Event::new(None, Some(3), EventKind::Click, 95 * day))?;
                Ok(())
            })
            .await
            .unwrap();

        let now = 101 * day;
        assert_eq!(
            orchestrator.trending_at(now, 7, 20).await.unwrap(),
            vec![(2, 1)]
        );
        assert_eq!(
            orchestrator.trending_at(now, 30, 20).await.unwrap(),
            vec![(2, 1), (3, 1)]
        );
    }

    #[tokio::test]
    async fn test_record_event_rejects_unknown_refs() {
        let orchestrator = build_test_orchestrator();

        let err = orchestrator
            .record_event(Some(ALICE), Some(999), EventKind::Click)
            .await
            .unwrap_err();
        assert!(is_not_found(&err));
        let err = orchestrator
            .record_event(Some(9999), Some(1), EventKind::Like)
            .await
            .unwrap_err();
        assert!(is_not_found(&err));

        let event = orchestrator
            .record_event(None, None, EventKind::Impression)
            .await
            .unwrap();
        assert!(event.timestamp > 0);
        let logged = orchestrator
            .with_read(|index| Ok(index.get_events().to_vec()))
            .await
            .unwrap();
        assert_eq!(logged, vec![event]);
    }

    // ============================================================================
    // Similarity
    // ============================================================================

    #[tokio::test]
    async fn test_similar_items_uses_configured_model() {
        let orchestrator = build_test_orchestrator();

        let similar = orchestrator
            .similar_items(ObjectType::Movie, 1, None, 10)
            .await
            .unwrap();
        let ids: Vec<ObjectId> = similar.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 3, 4]);

        let err = orchestrator
            .similar_items(ObjectType::Movie, 1, Some("v9".to_string()), 10)
            .await
            .unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn test_similar_items_zero_vector_query() {
        let orchestrator = build_test_orchestrator();
        let similar = orchestrator
            .similar_items(ObjectType::Movie, 4, None, 10)
            .await
            .unwrap();
        assert_eq!(similar.len(), 3);
        assert!(similar.iter().all(|(_, s)| *s == 0.0));
    }
}
