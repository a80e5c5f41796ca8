//! Core data model
//!
//! Documents and chunks are produced by ingestion and frozen inside corpus
//! snapshots; answers, citations and benchmark results are produced once
//! per question and never mutated afterwards.

mod answer;
mod document;

pub use answer::{
    AnswerResult, AnswerSource, BenchmarkResult, Citation, LegFailure, LegResult, Mode, RunStage,
};
pub use document::{
    doc_id_for, estimate_tokens, tokens_for_chars, Chunk, Document, DocumentSummary,
    IngestedSource,
};
