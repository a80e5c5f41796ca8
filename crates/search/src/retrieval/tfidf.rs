//! TF-IDF vector space over chunks
//!
//! Every chunk is one "document" for frequency purposes. Weights are raw
//! term counts times smoothed IDF, L2-normalized, so a dot product is the
//! cosine similarity.

use super::tokenize::terms;
use super::RankedChunk;
use navigator_common::corpus::CorpusSnapshot;
use navigator_common::errors::{AppError, Result};
use navigator_common::models::Chunk;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Sparse vector sorted by term id
type SparseVector = Vec<(usize, f64)>;

/// Lexical index for one corpus snapshot. Rebuilt, never patched.
#[derive(Debug)]
pub struct LexicalIndex {
    version: u64,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<SparseVector>,
    chunk_ids: Vec<String>,
    positions: HashMap<String, usize>,
    keep_stop_words: bool,
}

impl LexicalIndex {
    /// Index every chunk of `snapshot`, in snapshot order
    pub fn from_snapshot(snapshot: &CorpusSnapshot) -> Self {
        Self::build(snapshot.version(), snapshot.chunks())
    }

    /// Index `chunks` in the given order
    pub fn build<'a>(version: u64, chunks: impl IntoIterator<Item = &'a Chunk>) -> Self {
        let chunks: Vec<&Chunk> = chunks.into_iter().collect();

        let mut keep_stop_words = false;
        let mut analyzed: Vec<Vec<String>> =
            chunks.iter().map(|c| terms(&c.text, keep_stop_words)).collect();

        // A corpus made only of stop words still needs a vocabulary
        if !chunks.is_empty() && analyzed.iter().all(Vec::is_empty) {
            keep_stop_words = true;
            analyzed = chunks.iter().map(|c| terms(&c.text, keep_stop_words)).collect();
        }

        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut document_frequency: Vec<usize> = Vec::new();
        let mut counts: Vec<HashMap<usize, usize>> = Vec::with_capacity(analyzed.len());

        for chunk_terms in analyzed {
            let mut tf: HashMap<usize, usize> = HashMap::new();
            for term in chunk_terms {
                let next_id = vocabulary.len();
                let id = *vocabulary.entry(term).or_insert(next_id);
                if id == document_frequency.len() {
                    document_frequency.push(0);
                }
                *tf.entry(id).or_insert(0) += 1;
            }
            for &id in tf.keys() {
                document_frequency[id] += 1;
            }
            counts.push(tf);
        }

        let n = counts.len() as f64;
        let idf: Vec<f64> = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let vectors = counts
            .into_iter()
            .map(|tf| normalize(tf.into_iter().map(|(id, count)| (id, count as f64 * idf[id])).collect()))
            .collect();

        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        let positions = chunk_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();

        debug!(
            version,
            chunks = chunk_ids.len(),
            vocabulary = vocabulary.len(),
            keep_stop_words,
            "Lexical index built"
        );

        Self {
            version,
            vocabulary,
            idf,
            vectors,
            chunk_ids,
            positions,
            keep_stop_words,
        }
    }

    /// Snapshot version this index was built from
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.chunk_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_ids.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Cosine similarity of `question` against every chunk, in index order
    pub fn scores(&self, question: &str) -> Vec<f64> {
        let query = self.vectorize(question);
        self.vectors.iter().map(|v| dot(&query, v)).collect()
    }

    /// Rank all chunks by similarity to `question`, best first, ties in
    /// chunk order. At most `top_k` results.
    pub fn query(&self, question: &str, top_k: usize) -> Result<Vec<RankedChunk>> {
        if top_k == 0 {
            return Err(AppError::validation("top_k", "top_k must be at least 1"));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.scores(question);
        Ok(self.rank((0..scores.len()).map(|idx| (idx, scores[idx])), top_k))
    }

    /// Rank only the listed chunks; unknown ids are skipped
    pub fn rank_subset(&self, question: &str, chunk_ids: &[&str], top_k: usize) -> Vec<RankedChunk> {
        let query = self.vectorize(question);
        let scored = chunk_ids.iter().filter_map(|id| {
            let position = *self.positions.get(*id)?;
            Some((position, dot(&query, &self.vectors[position])))
        });
        self.rank(scored, top_k)
    }

    fn rank(&self, scored: impl Iterator<Item = (usize, f64)>, top_k: usize) -> Vec<RankedChunk> {
        let mut scored: Vec<(usize, f64)> = scored.collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(position, score)| RankedChunk {
                position,
                chunk_id: self.chunk_ids[position].clone(),
                score,
            })
            .collect()
    }

    fn vectorize(&self, text: &str) -> SparseVector {
        let mut tf: HashMap<usize, usize> = HashMap::new();
        for term in terms(text, self.keep_stop_words) {
            if let Some(&id) = self.vocabulary.get(&term) {
                *tf.entry(id).or_insert(0) += 1;
            }
        }
        normalize(tf.into_iter().map(|(id, count)| (id, count as f64 * self.idf[id])).collect())
    }
}

fn normalize(mut vector: SparseVector) -> SparseVector {
    vector.sort_by_key(|&(id, _)| id);
    let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for (_, weight) in vector.iter_mut() {
            *weight /= norm;
        }
    }
    vector
}

/// Dot product of two id-sorted sparse vectors
fn dot(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use navigator_common::models::Document;

    fn document(texts: &[&str]) -> Document {
        let mut doc = Document::new("policy.txt", 1);
        for text in texts {
            doc.push_chunk((*text).to_string(), 1, Some((1, 1)));
        }
        doc
    }

    #[test]
    fn test_single_overlapping_chunk_ranks_first() {
        let doc = document(&[
            "Hand hygiene before patient contact.",
            "Lactate must be measured within one hour of sepsis recognition.",
            "Discharge summaries are due in two days.",
        ]);
        let index = LexicalIndex::build(1, doc.chunks.iter());

        let ranked = index.query("When is lactate measured?", 1).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].chunk_id, doc.chunks[1].chunk_id);
        assert!(ranked[0].score > 0.0);
    }

    #[test]
    fn test_top_k_zero_rejected() {
        let doc = document(&["anything at all"]);
        let index = LexicalIndex::build(1, doc.chunks.iter());
        let err = index.query("anything", 0).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_empty_corpus() {
        let index = LexicalIndex::build(0, std::iter::empty());
        assert!(index.query("sepsis", 5).unwrap().is_empty());
    }

    #[test]
    fn test_no_shared_terms_keeps_chunk_order() {
        let doc = document(&["alpha beta", "gamma delta", "epsilon zeta"]);
        let index = LexicalIndex::build(1, doc.chunks.iter());

        let ranked = index.query("unrelated words", 2).unwrap();
        let positions: Vec<_> = ranked.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1]);
        assert!(ranked.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn test_ranking_is_descending_and_bounded() {
        let doc = document(&[
            "sepsis",
            "sepsis sepsis bundle",
            "bundle compliance",
            "sepsis bundle compliance audit",
        ]);
        let index = LexicalIndex::build(1, doc.chunks.iter());
        let ranked = index.query("sepsis bundle compliance", 3).unwrap();

        assert_eq!(ranked.len(), 3);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        let positions: Vec<_> = ranked.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![2, 3, 1]);
    }

    #[test]
    fn test_stop_word_only_corpus_falls_back() {
        let doc = document(&["to be or not to be", "the and of"]);
        let index = LexicalIndex::build(1, doc.chunks.iter());
        assert!(index.vocabulary_size() > 0);

        let ranked = index.query("not to be", 1).unwrap();
        assert_eq!(ranked[0].position, 0);
    }

    #[test]
    fn test_scores_are_cosine_bounded() {
        let doc = document(&["escalation policy", "escalation policy"]);
        let index = LexicalIndex::build(1, doc.chunks.iter());
        for score in index.scores("escalation policy") {
            assert!((score - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rank_subset() {
        let doc = document(&["lactate", "antibiotics", "lactate antibiotics"]);
        let index = LexicalIndex::build(1, doc.chunks.iter());
        let ids = [doc.chunks[0].chunk_id.as_str(), doc.chunks[1].chunk_id.as_str(), "missing:9"];

        let ranked = index.rank_subset("antibiotics", &ids, 5);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].chunk_id, doc.chunks[1].chunk_id);
    }
}
