//! Server crate for the ReelRecs recommendation engine.
//!
//! This crate contains the orchestrator that exposes every engine operation
//! over a shared store, and the engine configuration.

pub mod config;
pub mod orchestrator;

pub use config::EngineConfig;
pub use orchestrator::{MovieRecommendation, RecommendationOrchestrator, is_not_found};
