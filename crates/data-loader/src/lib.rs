//! # Data Loader Crate
//!
//! This crate owns the recommendation dataset: domain types, the query
//! interface the core consumes, the in-memory `DataIndex` store, JSON
//! snapshots and the aggregate maintainer for per-movie statistics.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (User, Movie, Rating, Event, MovieStats, DataIndex, ...)
//! - **query**: `Dataset` / `DatasetWriter` traits
//! - **index**: Trait implementations and integrity checks for `DataIndex`
//! - **aggregates**: Recompute of `avg_rating` / `rating_count` and the rating write path
//! - **snapshot**: JSON load/save
//! - **error**: Error taxonomy shared by the engine
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{aggregates, DataIndex, Dataset};
//! use std::path::Path;
//!
//! let mut index = DataIndex::load_snapshot(Path::new("data/snapshot.json"))?;
//!
//! // Every rating write goes through the maintainer
//! let stats = aggregates::rate(&mut index, 1, 42, 4.5, now)?;
//! println!("movie 42 now averages {:.2} over {}", stats.avg_rating, stats.rating_count);
//! ```

// Public modules
pub mod aggregates;
pub mod error;
pub mod index;
pub mod query;
pub mod snapshot;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{DataError, Result};
pub use query::{Dataset, DatasetWriter};
pub use snapshot::Snapshot;
pub use types::{
    // Type aliases
    GenreId,
    MovieId,
    ObjectId,
    TagId,
    UserId,
    // Core types
    CandidateMovie,
    DataIndex,
    Embedding,
    EmbeddingKey,
    Event,
    EventKind,
    Genre,
    Movie,
    MovieStats,
    ObjectType,
    Rating,
    RecommendationCache,
    Tag,
    User,
    // Constants
    MAX_RATING,
    MIN_RATING,
    is_valid_score,
};
