//! Document management handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::error::ApiResult;
use crate::AppState;
use navigator_common::{
    errors::AppError,
    models::{Document, DocumentSummary},
};
use navigator_ingestion::FileFailure;

/// A document submitted as already-extracted text
#[derive(Debug, Deserialize, Validate)]
pub struct TextDocumentInput {
    #[validate(length(min = 1, max = 255))]
    pub doc_name: String,

    pub text: String,

    /// Byte offsets at which pages start; omitted means paginate at blank lines
    #[serde(default)]
    pub page_boundaries: Option<Vec<usize>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    /// Folder to ingest; defaults to the configured monitored folder
    #[serde(default)]
    pub folder_path: Option<String>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub ingested_count: usize,
    pub documents: Vec<DocumentSummary>,
    pub snapshot_version: u64,
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub folder_path: String,
    pub ingested_count: usize,
    pub documents: Vec<DocumentSummary>,
    pub failures: Vec<FileFailure>,
    pub snapshot_version: u64,
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub status: String,
    pub removed_documents: usize,
    pub remaining_documents: usize,
    pub snapshot_version: u64,
}

/// List loaded documents
pub async fn list_documents(State(state): State<AppState>) -> Json<Vec<DocumentSummary>> {
    Json(state.corpus.snapshot().await.summaries())
}

/// Ingest text documents and publish a new snapshot
pub async fn create_documents(
    State(state): State<AppState>,
    Json(inputs): Json<Vec<TextDocumentInput>>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    if inputs.is_empty() {
        return Err(AppError::validation("documents", "At least one document is required").into());
    }
    for input in &inputs {
        input.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: Some("doc_name".to_string()),
        })?;
    }

    let processor = state.processor.clone();
    let documents: Vec<Document> = tokio::task::spawn_blocking(move || {
        inputs
            .into_iter()
            .map(|input| {
                let source = processor.source_from_text(
                    input.doc_name.trim(),
                    &input.text,
                    input.page_boundaries,
                );
                processor.ingest_source(&source)
            })
            .collect()
    })
    .await
    .map_err(|e| AppError::Internal { message: e.to_string() })?;

    let summaries: Vec<DocumentSummary> = documents.iter().map(Document::summary).collect();
    let snapshot = state.corpus.publish(documents).await;

    tracing::info!(
        ingested = summaries.len(),
        version = snapshot.version(),
        "Text documents ingested"
    );

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            ingested_count: summaries.len(),
            documents: summaries,
            snapshot_version: snapshot.version(),
        }),
    ))
}

/// Ingest every allowed file in a folder
pub async fn sync_folder(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> ApiResult<Json<SyncResponse>> {
    let folder = request
        .folder_path
        .map(PathBuf::from)
        .or_else(|| state.config.ingestion.monitored_dir.clone())
        .ok_or_else(|| {
            AppError::validation(
                "folder_path",
                "No folder_path provided and no monitored folder configured",
            )
        })?;

    let report = state
        .processor
        .sync_folder(&folder)
        .await
        .map_err(AppError::from)?;

    let summaries: Vec<DocumentSummary> = report.documents.iter().map(Document::summary).collect();
    let snapshot = state.corpus.publish(report.documents).await;

    Ok(Json(SyncResponse {
        folder_path: folder.display().to_string(),
        ingested_count: summaries.len(),
        documents: summaries,
        failures: report.failures,
        snapshot_version: snapshot.version(),
    }))
}

/// Remove every document
pub async fn reset_documents(State(state): State<AppState>) -> Json<ResetResponse> {
    let removed = state.corpus.reset().await;
    let snapshot = state.corpus.snapshot().await;

    Json(ResetResponse {
        status: "ok".to_string(),
        removed_documents: removed,
        remaining_documents: snapshot.documents().len(),
        snapshot_version: snapshot.version(),
    })
}
