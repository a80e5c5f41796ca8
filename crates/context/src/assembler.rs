//! Context Assembler - budgeted long-context payloads
//!
//! Provides:
//! - Greedy fill of chunk blocks in document order
//! - Char and token budgets, the tighter one governs
//! - Optional relevance ordering of documents before the fill
//!
//! Truncation always happens at a chunk boundary: a chunk is either fully
//! present in the payload or not at all.

use navigator_common::cache::ContextPayload;
use navigator_common::config::{AssemblyStrategy, ContextBudget};
use navigator_common::corpus::CorpusSnapshot;
use navigator_common::models::{tokens_for_chars, Chunk};
use navigator_search::LexicalIndex;
use std::cmp::Ordering;
use tracing::debug;

/// Separator between chunk blocks
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Weight of the best chunk score in a document's relevance
const BEST_CHUNK_WEIGHT: f64 = 0.7;

/// Weight of the mean over the top chunk scores
const TOP_CHUNKS_WEIGHT: f64 = 0.3;

/// Chunks averaged into a document's relevance
const TOP_CHUNKS: usize = 5;

/// Builds long-context payloads for one budget and strategy
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    budget: ContextBudget,
    strategy: AssemblyStrategy,
}

impl ContextAssembler {
    pub fn new(budget: ContextBudget, strategy: AssemblyStrategy) -> Self {
        Self { budget, strategy }
    }

    pub fn budget(&self) -> ContextBudget {
        self.budget
    }

    pub fn strategy(&self) -> AssemblyStrategy {
        self.strategy
    }

    /// Assemble `snapshot` under the configured budget.
    ///
    /// `index` must be built from `snapshot`; it is only consulted by the
    /// relevance strategy.
    pub fn assemble(
        &self,
        snapshot: &CorpusSnapshot,
        question: &str,
        index: Option<&LexicalIndex>,
    ) -> ContextPayload {
        match (self.strategy, index) {
            (AssemblyStrategy::Relevance, Some(index)) => {
                let order = relevance_order(snapshot, index, question);
                let chunks = order
                    .into_iter()
                    .flat_map(|idx| snapshot.documents()[idx].chunks.iter());
                fill(chunks, self.budget)
            }
            (AssemblyStrategy::Relevance, None) => {
                debug!("No lexical index supplied, assembling in ingestion order");
                assemble(snapshot, self.budget)
            }
            (AssemblyStrategy::Sequential, _) => assemble(snapshot, self.budget),
        }
    }
}

/// Documents in ingestion order, chunks in document order
pub fn assemble(snapshot: &CorpusSnapshot, budget: ContextBudget) -> ContextPayload {
    fill(snapshot.chunks(), budget)
}

/// Document indices ordered by relevance to `question`, best first.
///
/// Ties keep ingestion order.
pub fn relevance_order(snapshot: &CorpusSnapshot, index: &LexicalIndex, question: &str) -> Vec<usize> {
    let scores = index.scores(question);

    let mut offset = 0;
    let mut ranked: Vec<(usize, f64)> = Vec::with_capacity(snapshot.documents().len());
    for (doc_idx, doc) in snapshot.documents().iter().enumerate() {
        let end = (offset + doc.chunks.len()).min(scores.len());
        let doc_scores = scores.get(offset..end).unwrap_or(&[]);
        ranked.push((doc_idx, document_score(doc_scores)));
        offset = end;
    }

    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    ranked.into_iter().map(|(idx, _)| idx).collect()
}

/// `0.7 × best + 0.3 × mean(top 5)` over a document's chunk scores
pub fn document_score(chunk_scores: &[f64]) -> f64 {
    if chunk_scores.is_empty() {
        return 0.0;
    }

    let mut ordered = chunk_scores.to_vec();
    ordered.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    let best = ordered[0];
    let top = &ordered[..ordered.len().min(TOP_CHUNKS)];
    let mean_top = top.iter().sum::<f64>() / top.len() as f64;

    BEST_CHUNK_WEIGHT * best + TOP_CHUNKS_WEIGHT * mean_top
}

/// Append chunk blocks until the next one would break either budget
fn fill<'a>(chunks: impl Iterator<Item = &'a Chunk>, budget: ContextBudget) -> ContextPayload {
    let separator_chars = BLOCK_SEPARATOR.chars().count();

    let mut text = String::new();
    let mut chunk_ids = Vec::new();
    let mut char_count = 0usize;

    for chunk in chunks {
        let block_chars = chunk.context_block_chars();
        let added = if chunk_ids.is_empty() {
            block_chars
        } else {
            block_chars + separator_chars
        };
        let next_chars = char_count + added;

        if next_chars > budget.max_chars || tokens_for_chars(next_chars) > budget.max_tokens {
            debug!(
                included = chunk_ids.len(),
                chars = char_count,
                max_chars = budget.max_chars,
                max_tokens = budget.max_tokens,
                stopped_at = %chunk.chunk_id,
                "Context budget reached, truncating at chunk boundary"
            );
            break;
        }

        if !chunk_ids.is_empty() {
            text.push_str(BLOCK_SEPARATOR);
        }
        text.push_str(&chunk.context_block());
        chunk_ids.push(chunk.chunk_id.clone());
        char_count = next_chars;
    }

    ContextPayload {
        token_count: tokens_for_chars(char_count),
        text,
        chunk_ids,
        char_count,
    }
}
