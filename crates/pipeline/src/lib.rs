//! Personalized scoring of movie candidates.
//!
//! This crate provides:
//! - FeatureEngineer for turning candidates into scoring inputs
//! - ScoreWeights and the deterministic ranking order
//! - Recommender, the end-to-end top-K scorer for one user
//!
//! ## Architecture
//! The pipeline processes candidates in stages:
//! 1. The taste profile selects the liked set, top genres and top tags
//! 2. Every movie outside the liked set becomes a candidate
//! 3. FeatureEngineer computes features for each candidate
//! 4. Candidates are scored, ranked and truncated to `k`
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{Recommender, ScoreWeights};
//! use sources::TasteConfig;
//!
//! let recommender = Recommender::new(TasteConfig::default(), ScoreWeights::default());
//! let movie_ids = recommender.recommend(&index, user_id, 50)?;
//! ```

pub mod features;
pub mod ranking;
pub mod recommend;

// Re-export main types
pub use features::{CandidateFeatures, FeatureEngineer};
pub use ranking::{ScoreWeights, ScoredCandidate, compare_ranked, rank_and_select};
pub use recommend::{Explanation, Recommender};
