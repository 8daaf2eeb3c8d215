//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields the stock engine:
//!
//! ```json
//! {
//!   "like_threshold": 4.0,
//!   "top_genres": 5,
//!   "top_tags": 10,
//!   "default_k": 50,
//!   "model_version": "v1",
//!   "embedding_model_version": "v1",
//!   "trending_window_days": 7,
//!   "weights": { "avg_rating": 0.25, "shared_genres": 0.40 }
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::info;

use data_loader::{MAX_RATING, MIN_RATING};
use pipeline::{Recommender, ScoreWeights};
use sources::TasteConfig;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum score for a rating to count as "liked"
    pub like_threshold: f32,
    pub top_genres: usize,
    pub top_tags: usize,
    /// List length for cache builds and requests that give no `k`
    pub default_k: usize,
    /// Tag written into every recommendation cache row
    pub model_version: String,
    /// Embedding set used by `similar_items` when none is given
    pub embedding_model_version: String,
    /// Click window for `trending` when none is given
    pub trending_window_days: u32,
    pub weights: ScoreWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            like_threshold: 4.0,
            top_genres: 5,
            top_tags: 10,
            default_k: 50,
            model_version: "v1".to_string(),
            embedding_model_version: "v1".to_string(),
            trending_window_days: 7,
            weights: ScoreWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Config from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_RATING..=MAX_RATING).contains(&self.like_threshold) {
            bail!(
                "like_threshold {} outside [{}, {}]",
                self.like_threshold,
                MIN_RATING,
                MAX_RATING
            );
        }
        if self.model_version.trim().is_empty() {
            bail!("model_version must not be empty");
        }
        let w = &self.weights;
        let weights = [
            w.avg_rating,
            w.popularity,
            w.vote_average,
            w.rating_count,
            w.shared_genres,
            w.shared_tags,
        ];
        if weights.iter().any(|v| !v.is_finite()) {
            bail!("score weights must be finite numbers");
        }
        Ok(())
    }

    pub fn taste_config(&self) -> TasteConfig {
        TasteConfig::default()
            .with_like_threshold(self.like_threshold)
            .with_top_genres(self.top_genres)
            .with_top_tags(self.top_tags)
    }

    /// Scorer configured from this engine config
    pub fn recommender(&self) -> Recommender {
        Recommender::new(self.taste_config(), self.weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_weights_keep_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"default_k": 20, "weights": {"shared_tags": 1.0}}"#).unwrap();
        assert_eq!(config.default_k, 20);
        assert_eq!(config.weights.shared_tags, 1.0);
        assert_eq!(config.weights.shared_genres, 0.40);
        assert_eq!(config.like_threshold, 4.0);
        assert_eq!(config.trending_window_days, 7);
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let config = EngineConfig {
            like_threshold: 7.5,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_recommender_uses_config() {
        let config = EngineConfig {
            like_threshold: 3.5,
            top_genres: 2,
            ..EngineConfig::default()
        };
        let recommender = config.recommender();
        assert_eq!(recommender.taste_config().like_threshold, 3.5);
        assert_eq!(recommender.taste_config().top_genres, 2);
        assert_eq!(recommender.taste_config().top_tags, 10);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("reelrecs-config-{}.json", std::process::id()));
        fs::write(&path, r#"{"model_version": "v2"}"#).unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.model_version, "v2");

        assert!(EngineConfig::from_file(Path::new("/nonexistent/engine.json")).is_err());
    }
}
