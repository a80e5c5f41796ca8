//! Citation selection
//!
//! Chunks the answer explicitly points at with `[doc_name|page|...]`
//! markers are cited first, in the order they appear. When the answer
//! names none, the caller's ordering of contributing chunks is used.

use navigator_common::models::{Chunk, Citation};
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Maximum citations attached to one answer
pub const MAX_CITATIONS: usize = 5;

/// Maximum snippet length in characters
pub const SNIPPET_CHARS: usize = 220;

fn marker_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\[([^\[\]|]+)\|\s*(\d+)\s*((?:\|[^\[\]|]*)*)\]").ok())
        .as_ref()
}

/// A provenance marker found in answer text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerMarker {
    pub doc_name: String,
    pub page: u32,
    pub paragraphs: Option<(u32, u32)>,
    pub ordinal: Option<usize>,
}

/// All markers in `answer`, in order of appearance
pub fn parse_markers(answer: &str) -> Vec<AnswerMarker> {
    let Some(pattern) = marker_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(answer)
        .filter_map(|caps| {
            let doc_name = caps.get(1)?.as_str().trim().to_string();
            let page = caps.get(2)?.as_str().parse().ok()?;

            let mut paragraphs = None;
            let mut ordinal = None;
            let rest = caps.get(3).map_or("", |m| m.as_str());
            for part in rest.split('|').map(str::trim).filter(|p| !p.is_empty()) {
                if let Some(n) = part.strip_prefix("chunk:") {
                    ordinal = n.trim().parse().ok();
                } else if paragraphs.is_none() {
                    paragraphs = parse_paragraphs(part);
                }
            }

            Some(AnswerMarker { doc_name, page, paragraphs, ordinal })
        })
        .collect()
}

/// `¶3-4`, `3-4`, `¶5` or `5`
fn parse_paragraphs(part: &str) -> Option<(u32, u32)> {
    let part = part.trim_start_matches('¶').trim();
    match part.split_once('-') {
        Some((start, end)) => Some((start.trim().parse().ok()?, end.trim().parse().ok()?)),
        None => {
            let n = part.parse().ok()?;
            Some((n, n))
        }
    }
}

impl AnswerMarker {
    fn score(&self, chunk: &Chunk) -> Option<u8> {
        if chunk.doc_name != self.doc_name {
            return None;
        }
        if let Some(ordinal) = self.ordinal {
            return (chunk.ordinal == ordinal).then_some(3);
        }
        if chunk.page != self.page {
            return None;
        }
        match (self.paragraphs, chunk.paragraph_start.zip(chunk.paragraph_end)) {
            (Some((start, end)), Some((chunk_start, chunk_end))) => {
                (start <= chunk_end && chunk_start <= end).then_some(2).or(Some(1))
            }
            _ => Some(1),
        }
    }
}

/// Chunks from `candidates` referenced by markers in `answer`.
///
/// Each marker resolves to its best matching candidate not already taken.
pub fn referenced_chunks<'a>(answer: &str, candidates: &[&'a Chunk]) -> Vec<&'a Chunk> {
    let mut taken: HashSet<&str> = HashSet::new();
    let mut referenced = Vec::new();

    for marker in parse_markers(answer) {
        let best = candidates
            .iter()
            .filter(|chunk| !taken.contains(chunk.chunk_id.as_str()))
            .filter_map(|chunk| marker.score(chunk).map(|score| (score, *chunk)))
            .fold(None::<(u8, &Chunk)>, |best, (score, chunk)| match best {
                Some((best_score, _)) if best_score >= score => best,
                _ => Some((score, chunk)),
            });

        if let Some((_, chunk)) = best {
            taken.insert(chunk.chunk_id.as_str());
            referenced.push(chunk);
        }
    }
    referenced
}

/// Referenced chunks when the answer names any, `fallback_order` otherwise
pub fn select_citations(answer: &str, candidates: &[&Chunk], fallback_order: &[&Chunk]) -> Vec<Citation> {
    let referenced = referenced_chunks(answer, candidates);
    if referenced.is_empty() {
        build_citations(fallback_order.iter().copied())
    } else {
        build_citations(referenced)
    }
}

/// At most [`MAX_CITATIONS`], one per (doc, page, paragraph range)
pub fn build_citations<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    let mut citations = Vec::new();

    for chunk in chunks {
        let key = (
            chunk.doc_name.as_str(),
            chunk.page,
            chunk.paragraph_start,
            chunk.paragraph_end,
        );
        if !seen.insert(key) {
            continue;
        }

        citations.push(Citation {
            doc_name: chunk.doc_name.clone(),
            page: chunk.page,
            paragraph_start: chunk.paragraph_start,
            paragraph_end: chunk.paragraph_end,
            snippet: snippet(&chunk.text),
        });
        if citations.len() >= MAX_CITATIONS {
            break;
        }
    }
    citations
}

/// Whitespace-collapsed prefix of `text`
pub fn snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use navigator_common::models::Document;

    fn document() -> Document {
        let mut doc = Document::new("sepsis.pdf", 3);
        doc.push_chunk("Screen every admission.".into(), 1, Some((1, 2)));
        doc.push_chunk("Draw lactate.".into(), 2, Some((1, 1)));
        doc.push_chunk("Give   antibiotics\nwithin the hour.".into(), 2, Some((2, 3)));
        doc.push_chunk("Reassess at six hours.".into(), 3, None);
        doc
    }

    #[test]
    fn test_parse_markers() {
        let markers = parse_markers(
            "Start [sepsis.pdf|2|¶2-3|chunk:2] then [ policy.md | 7 ] and [x|3|4].",
        );
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[0].ordinal, Some(2));
        assert_eq!(markers[0].paragraphs, Some((2, 3)));
        assert_eq!(markers[1].doc_name, "policy.md");
        assert_eq!(markers[1].page, 7);
        assert_eq!(markers[2].paragraphs, Some((4, 4)));
    }

    #[test]
    fn test_ignores_non_markers() {
        assert!(parse_markers("see [1] and [note] and [a|b]").is_empty());
    }

    #[test]
    fn test_referenced_chunks_in_answer_order() {
        let doc = document();
        let candidates: Vec<&Chunk> = doc.chunks.iter().collect();

        let answer = "Reassess [sepsis.pdf|3]. Antibiotics first [sepsis.pdf|2|¶3].";
        let referenced = referenced_chunks(answer, &candidates);
        let ordinals: Vec<_> = referenced.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![3, 2]);
    }

    #[test]
    fn test_unknown_references_fall_back() {
        let doc = document();
        let candidates: Vec<&Chunk> = doc.chunks.iter().collect();
        let fallback = vec![&doc.chunks[1], &doc.chunks[0]];

        let citations = select_citations("See [other.pdf|1].", &candidates, &fallback);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].page, 2);
        assert_eq!(citations[1].page, 1);
    }

    #[test]
    fn test_build_citations_dedupes_and_caps() {
        let mut doc = Document::new("long.md", 1);
        for i in 0..8 {
            doc.push_chunk(format!("Paragraph {}", i), 1, Some((i, i)));
        }
        doc.push_chunk("Same range again".into(), 1, Some((0, 0)));

        let mut chunks: Vec<&Chunk> = vec![doc.chunks.last().unwrap()];
        chunks.extend(doc.chunks.iter());

        let citations = build_citations(chunks);
        assert_eq!(citations.len(), MAX_CITATIONS);
        assert_eq!(citations[0].snippet, "Same range again");
        assert_eq!(citations[1].paragraph_start, Some(1));
    }

    #[test]
    fn test_snippet_is_collapsed_and_bounded() {
        assert_eq!(snippet("  Give   antibiotics\nwithin\tthe hour. "), "Give antibiotics within the hour.");
        assert_eq!(snippet(&"é".repeat(500)).chars().count(), SNIPPET_CHARS);
    }
}
