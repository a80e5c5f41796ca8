//! Protocol Navigator ingestion
//!
//! Converts PDFs, plain text and markdown into page and paragraph
//! addressable chunks ready for a corpus snapshot.

pub mod chunker;
pub mod errors;
pub mod pages;
pub mod pdf;
pub mod processor;

pub use chunker::{build_document, chunk, ChunkingConfig, TextChunk};
pub use errors::IngestionError;
pub use processor::{FileFailure, IngestionProcessor, SyncReport};
