//! Personalized recommendation scorer.
//!
//! ## Flow
//! 1. Build the user's taste profile (liked set, top genres, top tags)
//! 2. Fetch every movie outside the liked set
//! 3. Compute features in parallel
//! 4. Score, rank deterministically and keep the top `k`
//!
//! The scorer is a pure read: it never writes to the store.

use crate::features::FeatureEngineer;
use crate::ranking::{ScoreWeights, ScoredCandidate, rank_and_select};
use data_loader::{Dataset, MovieId, Result, UserId};
use sources::{TasteConfig, TasteProfile, build_taste_profile};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Scores catalog movies for one user at a time
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Recommender {
    taste: TasteConfig,
    weights: ScoreWeights,
}

/// Full output of one scoring run, for inspection
#[derive(Debug, Clone)]
pub struct Explanation {
    pub profile: TasteProfile,
    /// Number of movies scored
    pub candidates_scored: usize,
    /// Ranked results, best first
    pub ranked: Vec<ScoredCandidate>,
}

impl Recommender {
    pub fn new(taste: TasteConfig, weights: ScoreWeights) -> Self {
        Self { taste, weights }
    }

    /// Replace the taste inference knobs
    pub fn with_taste_config(mut self, taste: TasteConfig) -> Self {
        self.taste = taste;
        self
    }

    /// Replace the scoring weights
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn taste_config(&self) -> &TasteConfig {
        &self.taste
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Up to `k` movie ids for `user_id`, best first.
    ///
    /// # Errors
    /// `NotFound` when the user does not exist. A known user with no ratings
    /// is not an error: the list is then ordered by item quality alone.
    pub fn recommend<D>(&self, data: &D, user_id: UserId, k: usize) -> Result<Vec<MovieId>>
    where
        D: Dataset + ?Sized,
    {
        let explanation = self.explain(data, user_id, k)?;
        Ok(explanation
            .ranked
            .into_iter()
            .map(|c| c.features.movie_id)
            .collect())
    }

    /// Same as [`Recommender::recommend`], keeping the profile, features and scores
    #[instrument(skip(self, data))]
    pub fn explain<D>(&self, data: &D, user_id: UserId, k: usize) -> Result<Explanation>
    where
        D: Dataset + ?Sized,
    {
        let start = Instant::now();

        let profile = build_taste_profile(data, user_id, &self.taste)?;
        if profile.is_cold() {
            debug!("cold user, ranking on item quality only");
        }

        // Liked movies are never recommended back
        let candidates = data.candidate_movies(&profile.liked_movies);
        let candidates_scored = candidates.len();
        debug!("Fetched {} candidates", candidates_scored);

        let features = FeatureEngineer::new(&profile).compute_features(&candidates);
        let ranked = rank_and_select(features, &self.weights, k);

        info!(
            "Scored {} candidates for user {} in {:?}, returning {}",
            candidates_scored,
            user_id,
            start.elapsed(),
            ranked.len()
        );

        Ok(Explanation {
            profile,
            candidates_scored,
            ranked,
        })
    }
}
