//! Text chunking module
//!
//! Splits extracted document text into page and paragraph addressable
//! chunks. Identical input always yields identical chunks.

use crate::pages::{blank_line_sections, split_pages};
use navigator_common::config::IngestionConfig;
use navigator_common::models::{Document, IngestedSource};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Stitched pseudo-paragraphs close once they reach this many characters
/// and end in sentence punctuation
const STITCH_MIN_CHARS: usize = 240;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1400 }
    }
}

impl From<&IngestionConfig> for ChunkingConfig {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
        }
    }
}

impl ChunkingConfig {
    /// Paragraphs longer than this are split on their own
    fn long_paragraph_chars(&self) -> usize {
        self.chunk_size * 13 / 10
    }
}

/// A chunk before it is attached to a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    /// 1-based page number
    pub page: u32,
    /// 1-based paragraph range within the page, when resolvable
    pub paragraphs: Option<(u32, u32)>,
}

/// Paragraphs of one page
struct PageParagraphs {
    paragraphs: Vec<String>,
    /// Paragraph numbers are meaningful
    numbered: bool,
}

/// Split document text into chunks in page, then paragraph order.
///
/// Empty or whitespace-only text yields no chunks.
pub fn chunk(text: &str, page_boundaries: &[usize], config: &ChunkingConfig) -> Vec<TextChunk> {
    let mut chunks = Vec::new();

    for (page_idx, page_text) in split_pages(text, page_boundaries).into_iter().enumerate() {
        let page = page_idx as u32 + 1;
        let layout = split_page_paragraphs(page_text);
        if layout.paragraphs.is_empty() {
            continue;
        }

        for (text, start, end) in pack_paragraphs(&layout.paragraphs, config) {
            chunks.push(TextChunk {
                text,
                page,
                paragraphs: layout.numbered.then_some((start, end)),
            });
        }
    }

    debug!(
        input_len = text.len(),
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        "Text chunked"
    );

    chunks
}

/// Chunk an ingested source into a [`Document`]
pub fn build_document(source: &IngestedSource, config: &ChunkingConfig) -> Document {
    let page_count = split_pages(&source.extracted_text, &source.page_boundaries).len() as u32;
    let mut document = Document::new(source.doc_name.clone(), source.page_count.max(page_count));

    for piece in chunk(&source.extracted_text, &source.page_boundaries, config) {
        document.push_chunk(piece.text, piece.page, piece.paragraphs);
    }
    document
}

fn split_page_paragraphs(page_text: &str) -> PageParagraphs {
    let raw = page_text.replace('\r', "\n");
    let blocks = blank_line_sections(&raw);

    if blocks.len() > 1 {
        return PageParagraphs {
            paragraphs: blocks
                .into_iter()
                .map(normalize_spaces)
                .filter(|p| !p.is_empty())
                .collect(),
            numbered: true,
        };
    }

    // No blank-line structure: stitch lines into sentence-closed paragraphs
    let mut stitched = Vec::new();
    let mut bucket: Vec<&str> = Vec::new();
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        bucket.push(line);
        let joined = bucket.join(" ");
        if joined.ends_with(['.', ';', ':']) && joined.chars().count() >= STITCH_MIN_CHARS {
            stitched.push(joined);
            bucket.clear();
        }
    }
    if !bucket.is_empty() {
        stitched.push(bucket.join(" "));
    }

    PageParagraphs {
        paragraphs: stitched
            .iter()
            .map(|p| normalize_spaces(p))
            .filter(|p| !p.is_empty())
            .collect(),
        numbered: false,
    }
}

/// Greedily pack paragraphs into chunks, returning `(text, first, last)`
/// paragraph numbers
fn pack_paragraphs(paragraphs: &[String], config: &ChunkingConfig) -> Vec<(String, u32, u32)> {
    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_start = 0u32;
    let mut buffer_end = 0u32;
    let mut current_len = 0usize;

    for (idx, paragraph) in paragraphs.iter().enumerate() {
        let number = idx as u32 + 1;
        let len = paragraph.chars().count();

        if len > config.long_paragraph_chars() {
            flush(&mut buffer, buffer_start, buffer_end, &mut chunks);
            current_len = 0;
            for piece in split_long_paragraph(paragraph, config.chunk_size) {
                chunks.push((piece, number, number));
            }
            continue;
        }

        if !buffer.is_empty() && current_len + len + 2 > config.chunk_size {
            flush(&mut buffer, buffer_start, buffer_end, &mut chunks);
            current_len = 0;
        }

        if buffer.is_empty() {
            buffer_start = number;
            current_len = len;
        } else {
            current_len += len + 2;
        }
        buffer.push(paragraph);
        buffer_end = number;
    }

    flush(&mut buffer, buffer_start, buffer_end, &mut chunks);
    chunks
}

fn flush(buffer: &mut Vec<&str>, start: u32, end: u32, chunks: &mut Vec<(String, u32, u32)>) {
    if !buffer.is_empty() {
        chunks.push((buffer.join("\n\n"), start, end));
        buffer.clear();
    }
}

/// Split at sentence, then word boundaries into pieces of at most
/// `chunk_size` characters
fn split_long_paragraph(paragraph: &str, chunk_size: usize) -> Vec<String> {
    let splitter = TextSplitter::new(ChunkConfig::new(chunk_size));
    splitter
        .chunks(paragraph)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
