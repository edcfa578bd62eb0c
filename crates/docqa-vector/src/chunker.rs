//! Character-based document splitting.
//!
//! Sizes are measured in characters, so multi-byte text never splits inside
//! a code point. Pages are separated by form feeds (`\x0c`); every chunk
//! records the page it came from and its position in the document. A window
//! that would end mid-word backs off to the last whitespace in its second
//! half.

use docqa_core::error::{DocqaError, Result};
use docqa_core::types::NewChunk;

/// Page separator inside extracted document text.
pub const PAGE_BREAK: char = '\x0c';

/// Splits document text into overlapping chunks.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(DocqaError::Config("chunk_size must be non-zero".to_string()));
        }
        if overlap >= chunk_size {
            return Err(DocqaError::Config(
                "chunk overlap must be less than chunk_size".to_string(),
            ));
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

    /// Split a whole document. Blank chunks are dropped.
    pub fn split_document(&self, text: &str, source: &str) -> Vec<NewChunk> {
        let mut out = Vec::new();
        let mut ordinal = 0u32;
        for (page, page_text) in text.split(PAGE_BREAK).enumerate() {
            for piece in self.split_text(page_text) {
                out.push(NewChunk::new(piece, source, page as u32, ordinal));
                ordinal += 1;
            }
        }
        out
    }

    /// Split one run of text into trimmed, non-empty windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut pieces = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let mut end = (start + self.chunk_size).min(chars.len());
            if end < chars.len() {
                let floor = start + self.chunk_size / 2;
                if let Some(ws) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                    if ws > start {
                        end = ws;
                    }
                }
            }

            let piece: String = chars[start..end].iter().collect();
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                pieces.push(trimmed.to_string());
            }

            if end >= chars.len() {
                break;
            }
            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }
        pieces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(10, 10).is_err());
        assert!(TextSplitter::new(10, 9).is_ok());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let splitter = TextSplitter::new(500, 50).unwrap();
        assert_eq!(splitter.split_text("  hello world  "), vec!["hello world"]);
        assert!(splitter.split_text("   \n ").is_empty());
        assert!(splitter.split_text("").is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        let splitter = TextSplitter::new(10, 4).unwrap();
        let pieces = splitter.split_text("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(pieces[0], "abcdefghij");
        assert_eq!(pieces[1], "ghijklmnop");
        assert!(pieces.last().unwrap().ends_with('z'));
    }

    #[test]
    fn test_prefers_whitespace_boundary() {
        let splitter = TextSplitter::new(12, 0).unwrap();
        let pieces = splitter.split_text("alpha beta gamma delta");
        assert_eq!(pieces[0], "alpha beta");
        assert!(pieces.iter().all(|p| !p.starts_with(' ')));
        let joined = pieces.join(" ");
        assert_eq!(joined, "alpha beta gamma delta");
    }

    #[test]
    fn test_multibyte_safe() {
        let splitter = TextSplitter::new(3, 1).unwrap();
        let pieces = splitter.split_text("héllo wörld 🦀🦀");
        assert!(!pieces.is_empty());
        for piece in &pieces {
            assert!(piece.chars().count() <= 3);
        }
    }

    #[test]
    fn test_pages_and_ordinals() {
        let splitter = TextSplitter::new(500, 50).unwrap();
        let chunks = splitter.split_document("page one\x0cpage two\x0c\x0cpage four", "/books/a.pdf");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].metadata.page, 0);
        assert_eq!(chunks[1].metadata.page, 1);
        assert_eq!(chunks[2].metadata.page, 3);
        let ordinals: Vec<u32> = chunks.iter().map(|c| c.metadata.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert!(chunks.iter().all(|c| c.metadata.source == "/books/a.pdf"));
    }

    #[test]
    fn test_always_advances() {
        let splitter = TextSplitter::new(2, 1).unwrap();
        let text = "x".repeat(50);
        let pieces = splitter.split_text(&text);
        assert_eq!(pieces.len(), 49);
    }
}
