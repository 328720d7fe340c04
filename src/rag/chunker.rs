//! Character-window text chunking.
//!
//! Text is split into successive windows of up to `chunk_size` Unicode
//! scalar values (Rust `char`s). Each window after the first starts
//! `chunk_size - chunk_overlap` characters after the previous one, and the
//! final window may be shorter. Sizes are counted in characters, not bytes
//! or model tokens.

use crate::types::{AppError, Result};

/// Check chunking parameters: `chunk_size > 0` and `chunk_overlap < chunk_size`.
pub fn validate_params(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(AppError::Config("chunk_size must be > 0".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(AppError::Config(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            chunk_overlap, chunk_size
        )));
    }
    Ok(())
}

/// Splits text into overlapping fixed-size character windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_params(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text`. Empty input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = bounds.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::with_capacity(len / step + 1);
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(len);
            chunks.push(text[bounds[start]..bounds[end]].to_string());
            if end == len {
                break;
            }
            start += step;
        }
        chunks
    }
}

/// Convenience wrapper: validate the parameters and chunk in one call.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    Ok(TextChunker::new(chunk_size, chunk_overlap)?.chunk(text))
}

/// Collapse whitespace runs and strip markup tags.
///
/// Applied to fetched pages, and to direct content on request.
pub fn clean_text(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let opens_tag = c == '<'
            && chars
                .peek()
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '/' || *n == '!');
        if opens_tag {
            // Drop everything through the closing '>'; an unclosed tag runs to the end.
            for n in chars.by_ref() {
                if n == '>' {
                    break;
                }
            }
            stripped.push(' ');
        } else {
            stripped.push(c);
        }
    }
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_reference_windows() {
        let chunks = chunk_text("AAA BBB CCC DDD", 7, 2).unwrap();
        assert_eq!(chunks, vec!["AAA BBB", "BB CCC ", "C DDD"]);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
    }

    #[rstest]
    #[case(0, 0)]
    #[case(10, 10)]
    #[case(10, 11)]
    fn test_invalid_params(#[case] size: usize, #[case] overlap: usize) {
        assert!(matches!(
            TextChunker::new(size, overlap),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_text_shorter_than_window() {
        assert_eq!(chunk_text("hi", 1000, 200).unwrap(), vec!["hi"]);
    }

    #[test]
    fn test_exact_fit_has_no_trailing_chunk() {
        // 10 chars, size 6, step 4: windows [0,6) and [4,10)
        let chunks = chunk_text("0123456789", 6, 2).unwrap();
        assert_eq!(chunks, vec!["012345", "456789"]);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "héllo wörld ünïcode";
        let chunks = chunk_text(text, 5, 1).unwrap();
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
        assert_eq!(chunks[0], "héllo");
    }

    #[rstest]
    #[case("AAA BBB CCC DDD", 7, 2)]
    #[case("The quick brown fox jumps over the lazy dog.", 10, 3)]
    #[case("ab", 5, 4)]
    #[case("日本語のテキストを分割します。", 4, 1)]
    #[case("x", 1, 0)]
    fn test_overlap_removed_reconstructs_text(
        #[case] text: &str,
        #[case] size: usize,
        #[case] overlap: usize,
    ) {
        let chunks = chunk_text(text, size, overlap).unwrap();

        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(overlap));
        }
        assert_eq!(rebuilt, text);

        let len = text.chars().count();
        if len > overlap {
            let step = size - overlap;
            let expected = (len - overlap).div_ceil(step);
            assert_eq!(chunks.len(), expected);
        } else {
            assert_eq!(chunks.len(), 1);
        }
    }

    #[test]
    fn test_clean_text() {
        let html = "<p>Hello,\n\n  <b>world</b>!</p>\t<br/>Done";
        assert_eq!(clean_text(html), "Hello, world ! Done");
    }

    #[test]
    fn test_clean_text_keeps_comparisons() {
        assert_eq!(clean_text("a < b and  c > d"), "a < b and c > d");
    }
}
