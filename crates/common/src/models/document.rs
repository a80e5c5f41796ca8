//! Documents and their citable chunks

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Approximate token count for a piece of text.
///
/// Uses roughly 4 characters per token. This is an estimate, not a
/// tokenizer: reported `context_tokens` carry the same imprecision.
pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_chars(text.chars().count())
}

/// Token estimate for a known character count
pub fn tokens_for_chars(chars: usize) -> usize {
    if chars == 0 {
        0
    } else {
        (chars / 4).max(1)
    }
}

/// Stable document identifier derived from the document name
pub fn doc_id_for(doc_name: &str) -> String {
    let digest = Sha256::digest(doc_name.as_bytes());
    hex::encode(digest)[..12].to_string()
}

/// Raw material handed over by the ingestion collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedSource {
    pub doc_name: String,
    pub page_count: u32,
    pub extracted_text: String,
    /// Byte offsets at which pages start; empty means a single page
    #[serde(default)]
    pub page_boundaries: Vec<usize>,
}

/// Smallest citable unit of document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{doc_id}:{ordinal}`
    pub chunk_id: String,

    pub doc_id: String,

    pub doc_name: String,

    /// Position within the owning document
    pub ordinal: usize,

    /// 1-based page number
    pub page: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_start: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_end: Option<u32>,

    pub text: String,

    pub token_estimate: usize,
}

impl Chunk {
    /// Bracketed provenance marker, e.g. `[policy.pdf|3|¶2-4|chunk:7]`
    pub fn marker(&self) -> String {
        match (self.paragraph_start, self.paragraph_end) {
            (Some(start), Some(end)) => format!(
                "[{}|{}|¶{}-{}|chunk:{}]",
                self.doc_name, self.page, start, end, self.ordinal
            ),
            _ => format!("[{}|{}|chunk:{}]", self.doc_name, self.page, self.ordinal),
        }
    }

    /// Chunk as it appears inside an assembled context
    pub fn context_block(&self) -> String {
        format!("{} {}", self.marker(), self.text)
    }

    /// Character count of [`Chunk::context_block`] without building it
    pub fn context_block_chars(&self) -> usize {
        self.marker().chars().count() + 1 + self.text.chars().count()
    }
}

/// An ingested document and its ordered chunks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub doc_name: String,
    pub page_count: u32,
    pub chunks: Vec<Chunk>,
}

impl Document {
    pub fn new(doc_name: impl Into<String>, page_count: u32) -> Self {
        let doc_name = doc_name.into();
        Self {
            doc_id: doc_id_for(&doc_name),
            doc_name,
            page_count,
            chunks: Vec::new(),
        }
    }

    /// Append the next chunk in document order
    pub fn push_chunk(&mut self, text: String, page: u32, paragraphs: Option<(u32, u32)>) {
        let ordinal = self.chunks.len();
        let token_estimate = estimate_tokens(&text);
        self.chunks.push(Chunk {
            chunk_id: format!("{}:{}", self.doc_id, ordinal),
            doc_id: self.doc_id.clone(),
            doc_name: self.doc_name.clone(),
            ordinal,
            page,
            paragraph_start: paragraphs.map(|(start, _)| start),
            paragraph_end: paragraphs.map(|(_, end)| end),
            text,
            token_estimate,
        });
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            doc_id: self.doc_id.clone(),
            doc_name: self.doc_name.clone(),
            pages: self.page_count,
            chunks: self.chunks.len(),
        }
    }
}

/// Listing view of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub doc_name: String,
    pub pages: u32,
    pub chunks: usize,
}
