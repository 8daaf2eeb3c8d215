//! Feature engineering for candidate scoring.
//!
//! This module turns each candidate movie into the numeric inputs of the
//! weighted score: item-level quality signals plus the overlap between the
//! candidate's genres/tags and the user's top genres/tags.

use data_loader::{CandidateMovie, GenreId, MovieId, TagId};
use rayon::prelude::*;
use sources::TasteProfile;
use std::collections::HashSet;
use tracing::warn;

/// Features computed for each candidate.
///
/// Every numeric field is total: missing inputs have already been coalesced to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFeatures {
    pub movie_id: MovieId,
    pub title: String,

    // Quality signals
    pub avg_rating: f32,
    pub rating_count: u32,
    pub popularity: f32,
    pub vote_average: f32,

    // Collaborative signals
    /// Distinct genres shared with the user's top genres
    pub shared_genres: u32,
    /// Distinct tags shared with the user's top tags
    pub shared_tags: u32,
}

impl CandidateFeatures {
    /// Create a new CandidateFeatures with default values.
    pub fn new(movie_id: MovieId, title: impl Into<String>) -> Self {
        Self {
            movie_id,
            title: title.into(),
            avg_rating: 0.0,
            rating_count: 0,
            popularity: 0.0,
            vote_average: 0.0,
            shared_genres: 0,
            shared_tags: 0,
        }
    }
}

/// Computes features for candidates in parallel.
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    top_genres: HashSet<GenreId>,
    top_tags: HashSet<TagId>,
}

impl FeatureEngineer {
    /// Create a FeatureEngineer for one user's taste profile.
    pub fn new(profile: &TasteProfile) -> Self {
        Self {
            top_genres: profile.top_genres.iter().copied().collect(),
            top_tags: profile.top_tags.iter().copied().collect(),
        }
    }

    /// Compute features for all candidates in parallel.
    ///
    /// # Returns
    /// Vec of CandidateFeatures, one per candidate, in the same order
    pub fn compute_features(&self, candidates: &[CandidateMovie]) -> Vec<CandidateFeatures> {
        let missing = candidates.iter().filter(|c| c.stats.is_none()).count();
        if missing > 0 {
            warn!(missing, "candidates have no aggregate row, scoring them as zero");
        }

        candidates
            .par_iter()
            .map(|candidate| self.compute_single(candidate))
            .collect()
    }

    /// Compute features for a single candidate.
    fn compute_single(&self, candidate: &CandidateMovie) -> CandidateFeatures {
        let mut features = CandidateFeatures::new(candidate.id, candidate.title.clone());

        if let Some(stats) = candidate.stats {
            features.avg_rating = finite_or_zero(stats.avg_rating);
            features.rating_count = stats.rating_count;
        }
        features.popularity = candidate.popularity.map_or(0.0, finite_or_zero);
        features.vote_average = candidate.vote_average.map_or(0.0, finite_or_zero);

        features.shared_genres = count_shared(&candidate.genre_ids, &self.top_genres);
        features.shared_tags = count_shared(&candidate.tag_ids, &self.top_tags);
        features
    }
}

/// Number of distinct ids in `ids` that are also in `top`
fn count_shared(ids: &[u32], top: &HashSet<u32>) -> u32 {
    if top.is_empty() {
        return 0;
    }
    let distinct: HashSet<&u32> = ids.iter().filter(|id| top.contains(*id)).collect();
    distinct.len() as u32
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() { value } else { 0.0 }
}
