//! Ingestion processor
//!
//! Turns files and raw text into chunked documents: PDF and plain-text
//! extraction, pagination, chunking and folder sync.

use crate::chunker::{build_document, ChunkingConfig};
use crate::errors::IngestionError;
use crate::pages::{join_pages, paginate_text};
use crate::pdf::extract_pages;
use navigator_common::config::IngestionConfig;
use navigator_common::metrics;
use navigator_common::models::{Document, IngestedSource};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, instrument};

/// A file that could not be ingested during a folder sync
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of a folder sync
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Ingested documents, in file name order
    pub documents: Vec<Document>,
    pub failures: Vec<FileFailure>,
}

/// Ingestion processor
#[derive(Debug, Clone)]
pub struct IngestionProcessor {
    chunking: ChunkingConfig,
    page_chars: usize,
    extensions: Vec<String>,
}

impl IngestionProcessor {
    pub fn new(config: &IngestionConfig) -> Self {
        Self {
            chunking: ChunkingConfig::from(config),
            page_chars: config.page_chars.max(1),
            extensions: config.extensions(),
        }
    }

    /// Whether `path` has an allowed extension
    pub fn accepts(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Wrap raw text as an ingested source.
    ///
    /// Without explicit page offsets the text is paginated at blank lines.
    pub fn source_from_text(
        &self,
        doc_name: &str,
        text: &str,
        page_boundaries: Option<Vec<usize>>,
    ) -> IngestedSource {
        match page_boundaries {
            Some(page_boundaries) => IngestedSource {
                doc_name: doc_name.to_string(),
                page_count: (page_boundaries.len() as u32).max(1),
                extracted_text: text.to_string(),
                page_boundaries,
            },
            None => {
                let pages = paginate_text(text, self.page_chars);
                source_from_pages(doc_name, &pages)
            }
        }
    }

    /// Read a `.pdf`, `.txt` or `.md` file
    pub fn read_source(&self, path: &Path) -> Result<IngestedSource, IngestionError> {
        if !path.is_file() {
            return Err(IngestionError::FileNotFound(path.display().to_string()));
        }

        let doc_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        match extension_of(path).as_deref() {
            Some(".pdf") => {
                let pages = extract_pages(path)?;
                Ok(source_from_pages(&doc_name, &pages))
            }
            Some(".txt") | Some(".md") => {
                let bytes = std::fs::read(path)?;
                let raw = String::from_utf8_lossy(&bytes);
                Ok(self.source_from_text(&doc_name, &raw, None))
            }
            _ => Err(IngestionError::UnsupportedFormat(doc_name)),
        }
    }

    /// Chunk an ingested source into a document
    #[instrument(skip(self, source), fields(doc_name = %source.doc_name))]
    pub fn ingest_source(&self, source: &IngestedSource) -> Document {
        let start = Instant::now();
        let document = build_document(source, &self.chunking);

        let kind = extension_of(Path::new(&source.doc_name)).unwrap_or_else(|| "text".to_string());
        metrics::record_ingestion(start.elapsed().as_secs_f64(), document.chunks.len(), &kind);

        info!(
            doc_id = %document.doc_id,
            pages = document.page_count,
            chunks = document.chunks.len(),
            "Document ingested"
        );
        document
    }

    /// Read and chunk a single file
    pub fn ingest_file(&self, path: &Path) -> Result<Document, IngestionError> {
        let source = self.read_source(path)?;
        Ok(self.ingest_source(&source))
    }

    /// Ingest every allowed file directly inside `dir`, in file name order.
    ///
    /// A file that fails is reported and skipped; the rest still load.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn sync_folder(&self, dir: &Path) -> Result<SyncReport, IngestionError> {
        if !dir.is_dir() {
            return Err(IngestionError::NotADirectory(dir.display().to_string()));
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && self.accepts(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        info!(files = paths.len(), "Syncing folder");

        let processor = self.clone();
        let outcomes = tokio::task::spawn_blocking(move || {
            paths
                .into_iter()
                .map(|path| {
                    let outcome = processor.ingest_file(&path);
                    (path, outcome)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| IngestionError::TaskFailed(e.to_string()))?;

        let mut report = SyncReport::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(document) => report.documents.push(document),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to ingest file");
                    report.failures.push(FileFailure {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            documents = report.documents.len(),
            failures = report.failures.len(),
            "Folder sync complete"
        );

        Ok(report)
    }
}

/// Join extracted pages into one source with page offsets
fn source_from_pages(doc_name: &str, pages: &[String]) -> IngestedSource {
    let (extracted_text, page_boundaries) = join_pages(pages);
    IngestedSource {
        doc_name: doc_name.to_string(),
        page_count: pages.len().max(1) as u32,
        extracted_text,
        page_boundaries,
    }
}

/// Lowercased extension with a leading dot
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "navigator-ingest-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn processor() -> IngestionProcessor {
        IngestionProcessor::new(&IngestionConfig::default())
    }

    #[test]
    fn test_accepts_allowed_extensions() {
        let p = processor();
        assert!(p.accepts(Path::new("a/Policy.PDF")));
        assert!(p.accepts(Path::new("notes.md")));
        assert!(!p.accepts(Path::new("sheet.xlsx")));
        assert!(!p.accepts(Path::new("README")));
    }

    #[test]
    fn test_text_source_is_paginated() {
        let section = "Sepsis bundle compliance review. ".repeat(60);
        let text = format!("{0}\n\n{0}\n\n{0}", section.trim());
        let source = processor().source_from_text("bundle.txt", &text, None);

        assert_eq!(source.page_count, 3);
        assert_eq!(source.page_boundaries.len(), 3);

        let doc = processor().ingest_source(&source);
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.chunks.last().map(|c| c.page), Some(3));
    }

    #[test]
    fn test_explicit_boundaries_are_kept() {
        let source = processor().source_from_text("x.txt", "abc\n\ndef", Some(vec![0, 5]));
        assert_eq!(source.page_boundaries, vec![0, 5]);
        assert_eq!(source.page_count, 2);
    }

    #[test]
    fn test_unsupported_file() {
        let dir = temp_dir("unsupported");
        let path = dir.join("table.csv");
        std::fs::write(&path, "a,b").unwrap();

        let err = processor().read_source(&path).unwrap_err();
        assert!(matches!(err, IngestionError::UnsupportedFormat(name) if name == "table.csv"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_sync_folder_orders_and_filters() {
        let dir = temp_dir("sync");
        std::fs::write(dir.join("b_policy.md"), "# Policy\n\nEscalate within one hour.").unwrap();
        std::fs::write(dir.join("a_notes.txt"), "Lactate above 2 mmol/L.\n\nRepeat in 6 hours.").unwrap();
        std::fs::write(dir.join("ignored.csv"), "x").unwrap();
        std::fs::write(dir.join("broken.pdf"), "not a pdf").unwrap();

        let report = processor().sync_folder(&dir).await.unwrap();
        let names: Vec<_> = report.documents.iter().map(|d| d.doc_name.as_str()).collect();
        assert_eq!(names, vec!["a_notes.txt", "b_policy.md"]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("broken.pdf"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_sync_missing_folder() {
        let err = tokio_test::block_on(processor().sync_folder(Path::new("/definitely/not/a/folder")))
            .unwrap_err();
        assert!(matches!(err, IngestionError::NotADirectory(_)));
    }
}
