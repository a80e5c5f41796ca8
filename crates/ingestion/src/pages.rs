//! Page layout helpers
//!
//! Pages travel as one extracted string plus the byte offsets where each
//! page starts. These helpers build that representation and cut it back
//! into per-page slices.

/// Separator placed between pages when joining them
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Split plain text into pseudo pages of roughly `page_chars` characters,
/// breaking only at blank lines.
///
/// A single section longer than `page_chars` becomes a page of its own.
pub fn paginate_text(raw: &str, page_chars: usize) -> Vec<String> {
    let mut pages = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut char_count = 0usize;

    for section in blank_line_sections(raw) {
        let size = section.chars().count();
        if !current.is_empty() && char_count + size > page_chars {
            pages.push(current.join(PAGE_SEPARATOR));
            current.clear();
            char_count = 0;
        }
        current.push(section);
        char_count += size;
    }

    if !current.is_empty() {
        pages.push(current.join(PAGE_SEPARATOR));
    }
    if pages.is_empty() {
        pages.push(raw.to_string());
    }
    pages
}

/// Join pages into one text, returning the start offset of every page
pub fn join_pages(pages: &[String]) -> (String, Vec<usize>) {
    let mut text = String::new();
    let mut boundaries = Vec::with_capacity(pages.len());

    for (idx, page) in pages.iter().enumerate() {
        if idx > 0 {
            text.push_str(PAGE_SEPARATOR);
        }
        boundaries.push(text.len());
        text.push_str(page);
    }

    (text, boundaries)
}

/// Cut `text` at page start offsets.
///
/// Offsets past the end, not on a char boundary, or not strictly
/// increasing are ignored. Text before the first kept offset forms page 1.
/// No usable offsets means the whole text is page 1.
pub fn split_pages<'a>(text: &'a str, boundaries: &[usize]) -> Vec<&'a str> {
    let mut starts = vec![0usize];
    for &offset in boundaries {
        let last = starts.last().copied().unwrap_or(0);
        if offset <= last || offset > text.len() || !text.is_char_boundary(offset) {
            continue;
        }
        starts.push(offset);
    }

    let mut pages = Vec::with_capacity(starts.len());
    for (idx, &start) in starts.iter().enumerate() {
        let end = starts.get(idx + 1).copied().unwrap_or(text.len());
        pages.push(&text[start..end]);
    }
    pages
}

/// Blank-line separated sections, keeping their inner line breaks
pub(crate) fn blank_line_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0usize;
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                sections.push(&text[s..end]);
            }
            continue;
        }

        if start.is_none() {
            start = Some(line_start);
        }
        end = line_start + line.trim_end().len();
    }

    if let Some(s) = start {
        sections.push(&text[s..end]);
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line_sections() {
        let text = "alpha\nbeta\n\n  \n\ngamma\r\n\r\ndelta";
        assert_eq!(blank_line_sections(text), vec!["alpha\nbeta", "gamma", "delta"]);
        assert!(blank_line_sections("  \n\n").is_empty());
    }

    #[test]
    fn test_paginate_breaks_at_blank_lines() {
        let section = "s".repeat(2000);
        let raw = format!("{0}\n\n{0}\n\n{0}", section);
        let pages = paginate_text(&raw, 3500);
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|p| p.chars().count() == 2000));

        let small = paginate_text("one\n\ntwo", 3500);
        assert_eq!(small, vec!["one\n\ntwo".to_string()]);
    }

    #[test]
    fn test_join_then_split_pages() {
        let pages = vec!["first page".to_string(), String::new(), "third".to_string()];
        let (text, boundaries) = join_pages(&pages);
        assert_eq!(boundaries, vec![0, 12, 14]);

        let split = split_pages(&text, &boundaries);
        assert_eq!(split.len(), 3);
        assert_eq!(split[0].trim(), "first page");
        assert_eq!(split[1].trim(), "");
        assert_eq!(split[2], "third");
    }

    #[test]
    fn test_split_pages_ignores_bad_offsets() {
        let text = "héllo world";
        // 2 falls inside 'é', 50 is out of range, 4 after 6 is unsorted
        let pages = split_pages(text, &[2, 6, 4, 50]);
        assert_eq!(pages, vec!["héllo", " world"]);
        assert_eq!(split_pages(text, &[]), vec![text]);
    }
}
