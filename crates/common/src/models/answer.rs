//! Answers, citations and benchmark results

use crate::errors::{AppError, ErrorCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Retrieval strategy used to answer a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Ranked subset of chunks from the lexical index
    Rag,
    /// As much of the corpus as fits the context budget
    LongContext,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Rag => "rag",
            Mode::LongContext => "long_context",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single mode run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Received,
    Retrieving,
    Generating,
    Citing,
    Done,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Received => "received",
            RunStage::Retrieving => "retrieving",
            RunStage::Generating => "generating",
            RunStage::Citing => "citing",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from an answer back to a chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub doc_name: String,
    pub page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_end: Option<u32>,
    pub snippet: String,
}

/// Where the answer text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Produced by the generation backend
    Generated,
    /// Deterministic fallback, no backend configured
    Fallback,
    /// Corpus was empty, nothing was sent anywhere
    NoDocuments,
}

/// Outcome of one mode run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub mode: Mode,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub latency_ms: u64,
    pub context_chunks: usize,
    pub context_chars: usize,
    pub context_tokens: usize,
    pub source: AnswerSource,
    /// Long-context only: payload was served from the context cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
}

/// Serializable description of a failed benchmark leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegFailure {
    pub mode: Mode,
    pub stage: RunStage,
    pub code: ErrorCode,
    pub message: String,
}

impl LegFailure {
    pub fn new(mode: Mode, stage: RunStage, error: &AppError) -> Self {
        Self {
            mode,
            stage,
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// One side of a benchmark comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegResult {
    Answer(AnswerResult),
    Failed { error: LegFailure },
}

impl LegResult {
    pub fn answer(&self) -> Option<&AnswerResult> {
        match self {
            LegResult::Answer(answer) => Some(answer),
            LegResult::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&LegFailure> {
        match self {
            LegResult::Answer(_) => None,
            LegResult::Failed { error } => Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, LegResult::Answer(_))
    }
}

/// RAG and long-context results for the same question and snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub question: String,
    pub snapshot_version: u64,
    pub inter_mode_delay_ms: u64,
    pub rag: LegResult,
    pub long_context: LegResult,
}
