//! Corpus snapshots with snapshot-and-swap publication
//!
//! Readers clone an `Arc<CorpusSnapshot>` and keep it for the whole
//! question; writers build a complete replacement snapshot and publish it
//! in one swap. Old snapshots are dropped once the last reader lets go.

use crate::metrics;
use crate::models::{Chunk, Document, DocumentSummary};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

/// Immutable, point-in-time view of all loaded documents
#[derive(Debug)]
pub struct CorpusSnapshot {
    version: u64,
    fingerprint: String,
    documents: Vec<Arc<Document>>,
    chunk_positions: HashMap<String, (usize, usize)>,
    chunk_count: usize,
}

impl CorpusSnapshot {
    /// Empty snapshot at version 0
    pub fn empty() -> Self {
        Self::build(0, Vec::new())
    }

    /// Build a snapshot directly from documents, in the given order
    pub fn from_documents(version: u64, documents: Vec<Document>) -> Self {
        Self::build(version, documents.into_iter().map(Arc::new).collect())
    }

    fn build(version: u64, documents: Vec<Arc<Document>>) -> Self {
        let mut hasher = Sha256::new();
        let mut chunk_positions = HashMap::new();
        let mut chunk_count = 0;

        for (doc_idx, doc) in documents.iter().enumerate() {
            hasher.update(doc.doc_id.as_bytes());
            hasher.update([0u8]);
            hasher.update(doc.doc_name.as_bytes());
            hasher.update([0u8]);
            hasher.update(doc.page_count.to_le_bytes());
            for (chunk_idx, chunk) in doc.chunks.iter().enumerate() {
                hasher.update(chunk.chunk_id.as_bytes());
                hasher.update([0u8]);
                // Location metadata is rendered into context markers
                hasher.update((chunk.ordinal as u64).to_le_bytes());
                hasher.update(chunk.page.to_le_bytes());
                for paragraph in [chunk.paragraph_start, chunk.paragraph_end] {
                    hasher.update(paragraph.map_or(0u64, |p| u64::from(p) + 1).to_le_bytes());
                }
                hasher.update(chunk.text.as_bytes());
                hasher.update([1u8]);
                chunk_positions.insert(chunk.chunk_id.clone(), (doc_idx, chunk_idx));
            }
            chunk_count += doc.chunks.len();
        }

        Self {
            version,
            fingerprint: hex::encode(hasher.finalize()),
            documents,
            chunk_positions,
            chunk_count,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Content hash; identical corpora share a fingerprint across versions
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_count == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// All chunks in document order, then chunk order
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.documents.iter().flat_map(|doc| doc.chunks.iter())
    }

    pub fn find_chunk(&self, chunk_id: &str) -> Option<&Chunk> {
        let (doc_idx, chunk_idx) = *self.chunk_positions.get(chunk_id)?;
        self.documents.get(doc_idx)?.chunks.get(chunk_idx)
    }

    pub fn summaries(&self) -> Vec<DocumentSummary> {
        self.documents.iter().map(|doc| doc.summary()).collect()
    }
}

/// Holder of the current corpus snapshot
pub struct CorpusStore {
    current: RwLock<Arc<CorpusSnapshot>>,
    writer: Mutex<()>,
}

impl Default for CorpusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(CorpusSnapshot::empty())),
            writer: Mutex::new(()),
        }
    }

    /// The snapshot every new question should use
    pub async fn snapshot(&self) -> Arc<CorpusSnapshot> {
        self.current.read().await.clone()
    }

    /// Add or replace documents and publish the resulting snapshot.
    ///
    /// A document whose `doc_id` is already loaded is replaced in place;
    /// new documents are appended in the order given.
    pub async fn publish(&self, incoming: Vec<Document>) -> Arc<CorpusSnapshot> {
        let _writer = self.writer.lock().await;
        let base = self.snapshot().await;

        let mut documents: Vec<Arc<Document>> = base.documents().to_vec();
        let mut added = 0usize;
        let mut replaced = 0usize;
        for doc in incoming {
            let doc = Arc::new(doc);
            match documents.iter().position(|d| d.doc_id == doc.doc_id) {
                Some(idx) => {
                    documents[idx] = doc;
                    replaced += 1;
                }
                None => {
                    documents.push(doc);
                    added += 1;
                }
            }
        }

        let next = Arc::new(CorpusSnapshot::build(base.version() + 1, documents));
        *self.current.write().await = next.clone();
        metrics::record_corpus_version(next.version());

        info!(
            version = next.version(),
            added,
            replaced,
            documents = next.documents().len(),
            chunks = next.chunk_count(),
            "Corpus snapshot published"
        );
        next
    }

    /// Drop every document; returns how many were removed
    pub async fn reset(&self) -> usize {
        let _writer = self.writer.lock().await;
        let base = self.snapshot().await;
        let removed = base.documents().len();

        let next = Arc::new(CorpusSnapshot::build(base.version() + 1, Vec::new()));
        *self.current.write().await = next;
        metrics::record_corpus_version(base.version() + 1);

        info!(removed, version = base.version() + 1, "Corpus reset");
        removed
    }
}
