//! Question answering and benchmark handlers

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::error::ApiResult;
use crate::AppState;
use navigator_common::{
    errors::AppError,
    models::{AnswerResult, BenchmarkResult, Mode},
};

/// Ask request
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 3, max = 4000))]
    pub question: String,

    /// Retrieval strategy (default: rag)
    #[serde(default = "default_mode")]
    pub mode: Mode,

    /// Chunks retrieved in RAG mode; also bounds long-context citations
    #[validate(range(min = 1, max = 20))]
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Benchmark request
#[derive(Debug, Deserialize, Validate)]
pub struct BenchmarkRequest {
    #[validate(length(min = 3, max = 4000))]
    pub question: String,

    #[validate(range(min = 1, max = 20))]
    #[serde(default)]
    pub top_k: Option<usize>,
}

fn default_mode() -> Mode {
    Mode::Rag
}

fn invalid(e: validator::ValidationErrors) -> AppError {
    AppError::Validation {
        message: e.to_string(),
        field: None,
    }
}

/// Answer a question with one mode
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> ApiResult<Json<AnswerResult>> {
    request.validate().map_err(invalid)?;

    let snapshot = state.corpus.snapshot().await;
    let result = state
        .comparator
        .runner()
        .run(request.mode, request.question.trim(), request.top_k, &snapshot)
        .await?;

    tracing::info!(
        mode = %result.mode,
        latency_ms = result.latency_ms,
        context_chunks = result.context_chunks,
        context_tokens = result.context_tokens,
        citations = result.citations.len(),
        "Question answered"
    );

    Ok(Json(result))
}

/// Run both modes on the same question and snapshot
pub async fn benchmark(
    State(state): State<AppState>,
    Json(request): Json<BenchmarkRequest>,
) -> ApiResult<Json<BenchmarkResult>> {
    request.validate().map_err(invalid)?;

    let snapshot = state.corpus.snapshot().await;
    let result = state
        .comparator
        .compare(request.question.trim(), request.top_k, &snapshot)
        .await;

    Ok(Json(result))
}
