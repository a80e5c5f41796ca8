//! Deterministic answers when no generation backend is configured

use crate::models::Chunk;

/// Prefix identifying fallback answers
pub const FALLBACK_PREFIX: &str = "LLM fallback:";

const SNIPPET_CHARS: usize = 240;
const MAX_MATCHES: usize = 3;

/// Answer text built from the question and the strongest contributing chunks.
///
/// Identical inputs always produce identical text.
pub fn fallback_answer(question: &str, chunks: &[&Chunk]) -> String {
    let mut lines = vec![
        format!(
            "{} no generation backend is configured. This response is built from retrieved context.",
            FALLBACK_PREFIX
        ),
        String::new(),
    ];

    if chunks.is_empty() {
        lines.push("No relevant content was found in uploaded documents.".to_string());
        return lines.join("\n");
    }

    lines.push(format!("Question: {}", question.trim()));
    lines.push("Summary from strongest matches:".to_string());
    for chunk in chunks.iter().take(MAX_MATCHES) {
        let snippet: String = chunk.text.chars().take(SNIPPET_CHARS).collect();
        lines.push(format!("- {} {}", chunk.marker(), snippet));
    }

    lines.join("\n")
}
