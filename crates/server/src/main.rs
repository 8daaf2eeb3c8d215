//! Simple harness for the recommendation orchestrator.
//!
//! Loads a snapshot, refreshes every aggregate, prints recommendations for
//! one user and precomputes the recommendation cache for all users.
//!
//! Usage: server [snapshot.json] [user_id] [engine.json]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use data_loader::DataIndex;
use server::{EngineConfig, RecommendationOrchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting ReelRecs server harness");

    let mut args = std::env::args().skip(1);
    let data_path = PathBuf::from(args.next().unwrap_or_else(|| "data/snapshot.json".to_string()));
    let user_id: u32 = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("Invalid user id {:?}", raw))?,
        None => 1,
    };
    let config = EngineConfig::load(args.next().as_deref().map(Path::new))?;

    info!("Loading data index from {}...", data_path.display());
    let data_index = DataIndex::load_snapshot(&data_path)
        .with_context(|| format!("Failed to load snapshot {}", data_path.display()))?;
    let (users, movies, ratings) = data_index.counts();
    info!("Loaded {} users, {} movies, {} ratings", users, movies, ratings);

    let default_k = config.default_k;
    let orchestrator = RecommendationOrchestrator::new(data_index, config);

    let updated = orchestrator.recompute_all_aggregates().await?;
    info!("Refreshed aggregates for {} movies", updated);

    info!("Getting recommendations for user {} (limit: {})", user_id, default_k);
    let recommendations = orchestrator.explain(user_id, default_k).await?;
    info!("Received {} recommendations:", recommendations.len());
    for (i, rec) in recommendations.iter().enumerate() {
        info!(
            "{}. {} ({}) - Score: {:.3}",
            i + 1,
            rec.title,
            rec.year.map(|y| y.to_string()).unwrap_or_else(|| "????".to_string()),
            rec.score
        );
        info!("   Genres: {}", rec.genres.join(", "));
        info!("   {}", rec.explanation);
    }

    let rebuilt = orchestrator.rebuild_cache_for_all(default_k, None).await?;
    info!("Precomputed recommendation cache for {} users", rebuilt);

    orchestrator.save_snapshot(data_path).await?;
    Ok(())
}
