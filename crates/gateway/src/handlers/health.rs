//! Health and status handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub version: String,
    pub context_profile: String,
    pub assembly_strategy: String,
    pub max_context_chars: usize,
    pub max_context_tokens: usize,
    pub default_top_k: usize,
    pub cache: CacheStatus,
    pub documents: usize,
    pub chunks: usize,
    pub snapshot_version: u64,
    pub backend_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitored_dir: Option<String>,
    pub allowed_extensions: Vec<String>,
    pub inter_mode_delay_secs: f64,
}

#[derive(Serialize)]
pub struct CacheStatus {
    pub enabled: bool,
    pub ttl_minutes: u64,
    pub min_chars: usize,
    pub entries: usize,
}

/// Liveness probe - always returns ok if the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Active configuration and corpus state
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.corpus.snapshot().await;
    let runner = state.comparator.runner();
    let settings = runner.settings();
    let config = &state.config;

    Json(StatusResponse {
        service: config.observability.service_name.clone(),
        version: navigator_common::VERSION.to_string(),
        context_profile: settings.profile.as_str().to_string(),
        assembly_strategy: settings.strategy.as_str().to_string(),
        max_context_chars: settings.budget.max_chars,
        max_context_tokens: settings.budget.max_tokens,
        default_top_k: settings.default_top_k,
        cache: CacheStatus {
            enabled: runner.cache().is_enabled(),
            ttl_minutes: config.cache.ttl_minutes,
            min_chars: config.cache.min_chars,
            entries: runner.cache().len().await,
        },
        documents: snapshot.documents().len(),
        chunks: snapshot.chunk_count(),
        snapshot_version: snapshot.version(),
        backend_configured: runner.backend_configured(),
        monitored_dir: config
            .ingestion
            .monitored_dir
            .as_ref()
            .map(|dir| dir.display().to_string()),
        allowed_extensions: config.ingestion.extensions(),
        inter_mode_delay_secs: config.benchmark.inter_mode_delay_secs,
    })
}
