//! Protocol Navigator Common Library
//!
//! Shared code for the navigator crates including:
//! - Document, chunk and answer models
//! - Corpus snapshots with snapshot-and-swap publication
//! - Long-context payload cache
//! - Answer generation client with retry and fallback
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod cache;
pub mod config;
pub mod corpus;
pub mod errors;
pub mod generation;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use cache::{ContextCache, ContextPayload};
pub use config::AppConfig;
pub use corpus::{CorpusSnapshot, CorpusStore};
pub use errors::{AppError, Result};
pub use generation::{AnswerBackend, AnswerClient, GenerationError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
