//! Text cleanup and word-window chunking
//!
//! ADRs are markdown; headers are stripped and whitespace collapsed before
//! the text is split into overlapping windows of whole words. Windowing is
//! deliberately simple: each chunk is independently addressed downstream,
//! so boundaries only need to be deterministic, not clever.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// A contiguous span of cleaned text from one source file
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Source file path, relative to the loaded directory
    pub source_path: String,
    /// 1-based position within the file
    pub ordinal: usize,
    /// Cleaned chunk text
    pub text: String,
    /// Number of words in the chunk
    pub word_count: usize,
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#+\s*").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strip markdown headers and collapse whitespace
pub fn clean_text(text: &str) -> String {
    let no_headers = header_re().replace_all(text, "");
    whitespace_re()
        .replace_all(&no_headers, " ")
        .trim()
        .to_string()
}

/// Split cleaned text into overlapping word windows.
///
/// Each window holds `chunk_size` words and starts `chunk_size - overlap`
/// words after the previous one. Ordinals are 1-based. `overlap` must be
/// smaller than `chunk_size` or the window would never advance.
pub fn chunk_text(
    text: &str,
    source_path: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    validate_chunk_geometry(chunk_size, overlap)?;

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        let window = &words[start..end];
        chunks.push(Chunk {
            source_path: source_path.to_string(),
            ordinal: chunks.len() + 1,
            text: window.join(" "),
            word_count: window.len(),
        });
        start += step;
    }

    Ok(chunks)
}

/// Reject window settings that could never make progress.
pub fn validate_chunk_geometry(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::Config("chunk size must be positive".to_string()));
    }
    if overlap >= chunk_size {
        return Err(Error::Config(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_strips_headers_and_whitespace() {
        let raw = "# Title\n\n## Context\nWe   chose\tPostgres.\n";
        assert_eq!(clean_text(raw), "Title Context We chose Postgres.");
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", "a.md", 10, 2).unwrap().is_empty());
        assert!(chunk_text("   \n ", "a.md", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        // Equal overlap would mean a zero step and no forward progress.
        let equal = chunk_text("some words here", "a.md", 4, 4);
        assert!(matches!(equal, Err(Error::Config(_))));

        let larger = chunk_text("some words here", "a.md", 3, 5);
        assert!(matches!(larger, Err(Error::Config(_))));

        let zero = chunk_text("some words here", "a.md", 0, 0);
        assert!(matches!(zero, Err(Error::Config(_))));
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("one two three", "a.md", 10, 2).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "one two three");
        assert_eq!(chunks[0].ordinal, 1);
        assert_eq!(chunks[0].word_count, 3);
    }

    #[test]
    fn test_windows_overlap() {
        let words: Vec<String> = (0..10).map(|i| format!("w{}", i)).collect();
        let text = words.join(" ");

        let chunks = chunk_text(&text, "a.md", 4, 1).unwrap();

        // Step of 3: starts at 0, 3, 6, 9.
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].text, "w0 w1 w2 w3");
        assert_eq!(chunks[1].text, "w3 w4 w5 w6");
        assert_eq!(chunks[3].text, "w9");
        assert_eq!(chunks[3].ordinal, 4);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let a = chunk_text(text, "a.md", 3, 1).unwrap();
        let b = chunk_text(text, "a.md", 3, 1).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
        }
    }
}
