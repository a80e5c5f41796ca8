//! Lexical retrieval over corpus snapshots
//!
//! Chunks are ranked by TF-IDF cosine similarity. One index is kept per
//! snapshot version and rebuilt lazily when a newer snapshot shows up.

mod tfidf;
mod tokenize;

pub use tfidf::LexicalIndex;
pub use tokenize::{is_stop_word, terms, words};

use navigator_common::corpus::CorpusSnapshot;
use navigator_common::errors::Result;
use navigator_common::models::Chunk;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, instrument};

/// Position of a chunk in a ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedChunk {
    /// Index of the chunk in snapshot order
    pub position: usize,
    pub chunk_id: String,
    /// Cosine similarity in [0, 1]
    pub score: f64,
}

/// Retrieved chunk with relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Keep chunks that share at least one term with the question.
///
/// When nothing matches the ranking is returned unchanged, so callers still
/// have some context to hand over.
pub fn prefer_matches(ranked: Vec<RankedChunk>) -> Vec<RankedChunk> {
    if ranked.iter().any(|r| r.score > 0.0) {
        ranked.into_iter().filter(|r| r.score > 0.0).collect()
    } else {
        ranked
    }
}

/// TF-IDF retriever with a per-version index cache
#[derive(Debug, Default)]
pub struct LexicalRetriever {
    index: Mutex<Option<Arc<LexicalIndex>>>,
}

impl LexicalRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot version of the cached index, if one has been built
    pub fn indexed_version(&self) -> Option<u64> {
        self.index
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|index| index.version()))
    }

    /// Index for `snapshot`, building it if the cached one is stale
    pub fn index_for(&self, snapshot: &CorpusSnapshot) -> Arc<LexicalIndex> {
        if let Ok(guard) = self.index.lock() {
            if let Some(index) = guard.as_ref() {
                if index.version() == snapshot.version() {
                    return index.clone();
                }
            }
        }

        let start = Instant::now();
        let index = Arc::new(LexicalIndex::from_snapshot(snapshot));
        debug!(
            version = snapshot.version(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Rebuilt lexical index"
        );

        if let Ok(mut guard) = self.index.lock() {
            // Never replace a newer index with an older one
            let stale = guard
                .as_ref()
                .map_or(true, |current| current.version() <= index.version());
            if stale {
                *guard = Some(index.clone());
            }
        }
        index
    }

    /// Top `top_k` chunks of `snapshot` for `question`, best first
    #[instrument(skip(self, snapshot, question), fields(version = snapshot.version()))]
    pub fn retrieve(
        &self,
        snapshot: &CorpusSnapshot,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let index = self.index_for(snapshot);
        let ranked = prefer_matches(index.query(question, top_k)?);

        let retrieved: Vec<RetrievedChunk> = ranked
            .into_iter()
            .filter_map(|r| {
                snapshot.find_chunk(&r.chunk_id).map(|chunk| RetrievedChunk {
                    chunk: chunk.clone(),
                    score: r.score,
                })
            })
            .collect();

        debug!(results = retrieved.len(), "Lexical retrieval complete");
        Ok(retrieved)
    }
}
