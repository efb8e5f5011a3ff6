//! Sentence-aware text chunking.
//!
//! Splits extracted document text into overlapping chunks. Chunk index
//! order is load-bearing downstream: chunk ids are derived from it and
//! the overlap semantics assume contiguous windows.

use crate::errors::ApiError;

#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker. `overlap >= chunk_size` never terminates, so it
    /// is rejected as a configuration error.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ApiError> {
        if chunk_size == 0 {
            return Err(ApiError::Validation(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(ApiError::Validation(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into ordered, overlapping chunks.
    ///
    /// Windows are `chunk_size` characters wide. A window that does not
    /// reach the end of the text is cut back to the last `.` or newline,
    /// provided that boundary lies past the window midpoint; this avoids
    /// mid-sentence cuts without shrinking chunks below half size. The
    /// next window starts `overlap` characters before the previous end;
    /// when a large overlap plus an early cut would put that start at or
    /// before the current one, the next window starts at the cut
    /// instead, so every iteration advances.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();

        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < total {
            let mut end = (start + self.chunk_size).min(total);

            if end < total {
                if let Some(break_point) = last_sentence_break(&chars, start, end) {
                    // Only cut early when the boundary sits past the midpoint,
                    // otherwise the raw window boundary wins.
                    if break_point > start + self.chunk_size / 2 {
                        end = break_point + 1;
                    }
                }
            }

            let piece: String = chars[start..end].iter().collect();
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }

            if end >= total {
                break;
            }
            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }
}

/// Index of the last `.` or `\n` in `chars[start..end]`, if any.
fn last_sentence_break(chars: &[char], start: usize, end: usize) -> Option<usize> {
    chars[start..end]
        .iter()
        .rposition(|&c| c == '.' || c == '\n')
        .map(|pos| start + pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_yields_single_trimmed_chunk() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        let chunks = chunker.chunk("  hello world  ");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n  ").is_empty());
    }

    #[test]
    fn plain_document_produces_expected_window_count() {
        // 2500 chars, size 1000, overlap 200: windows [0,1000), [800,1800), [1600,2500).
        let chunker = TextChunker::new(1000, 200).unwrap();
        let text = "a".repeat(2500);
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 1000);
        assert_eq!(chunks[2].len(), 900);
    }

    #[test]
    fn cuts_at_sentence_boundary_past_midpoint() {
        let chunker = TextChunker::new(100, 20).unwrap();
        // Sentence end at index 79 (past midpoint 50), within the first window.
        let mut text = "x".repeat(79);
        text.push('.');
        text.push_str(&"y".repeat(120));
        let chunks = chunker.chunk(&text);
        // First chunk ends right after the period instead of at char 100.
        assert_eq!(chunks[0].len(), 80);
        assert!(chunks[0].ends_with('.'));
    }

    #[test]
    fn ignores_sentence_boundary_before_midpoint() {
        let chunker = TextChunker::new(100, 20).unwrap();
        let mut text = "x".repeat(30);
        text.push('.');
        text.push_str(&"y".repeat(200));
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks[0].len(), 100);
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let chunker = TextChunker::new(100, 20).unwrap();
        let text: String = ('a'..='z').cycle().take(300).collect();
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() >= 2);
        let tail: String = chunks[0].chars().rev().take(20).collect::<Vec<_>>().iter().rev().collect();
        assert!(chunks[1].starts_with(&tail));
    }

    #[test]
    fn deterministic_across_calls() {
        let chunker = TextChunker::new(120, 30).unwrap();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        assert_eq!(chunker.chunk(&text), chunker.chunk(&text));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        assert!(matches!(
            TextChunker::new(100, 100),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            TextChunker::new(100, 150),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(TextChunker::new(0, 0), Err(ApiError::Validation(_))));
    }

    #[test]
    fn large_overlap_with_early_cut_still_terminates() {
        // Overlap wider than half the window: a sentence end just past
        // the midpoint puts the cut before end - overlap, which must
        // advance to the cut rather than underflow or stall.
        let chunker = TextChunker::new(1000, 600).unwrap();
        let mut text = "x".repeat(501);
        text.push('.');
        text.push_str(&"y".repeat(2000));

        let chunks = chunker.chunk(&text);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].ends_with('.'));
        // Every character after the cut is covered by later chunks.
        let tail_chars: usize = chunks[1..].iter().map(|c| c.chars().count()).sum();
        assert!(tail_chars >= 2000);
    }

    #[test]
    fn handles_multibyte_text_without_panicking() {
        let chunker = TextChunker::new(50, 10).unwrap();
        let text = "日本語のテキスト。".repeat(30);
        let chunks = chunker.chunk(&text);
        assert!(!chunks.is_empty());
    }
}
