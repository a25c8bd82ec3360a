//! Boundary-aware text chunking.
//!
//! Splits extracted document text into overlapping windows sized for
//! embedding, preferring natural break points over hard cuts. Offsets are in
//! Unicode code points so a chunk's span always addresses the original text
//! regardless of encoding width.

mod parser;

pub use parser::{DocumentParser, ParsedDocument, PlainTextParser, process_document};

use tracing::debug;

use mnemo_core::Chunk;

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Chunking configuration. Overlap is clamped below the chunk size so the
/// window always advances.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker {
    pub fn new(max_chunk_size: usize, overlap: usize) -> Self {
        let max_chunk_size = max_chunk_size.max(1);
        Self {
            max_chunk_size,
            overlap: overlap.min(max_chunk_size - 1),
        }
    }

    /// Split `text` into ordered chunks.
    ///
    /// Break-point priority within the trailing search window: paragraph
    /// break, then a newline close to the boundary, then a sentence ending,
    /// then a comma close to the boundary, then any space, then a hard cut.
    /// Chunk text is trimmed; spans keep the untrimmed offsets. Windows that
    /// trim to nothing are dropped without consuming an index.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();

        if len <= self.max_chunk_size {
            return vec![Chunk {
                text: text.trim().to_string(),
                index: 0,
                start: 0,
                end: len,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0usize;

        while start < len {
            let potential_end = start + self.max_chunk_size;

            if potential_end >= len {
                let remaining: String = chars[start..].iter().collect();
                let remaining = remaining.trim();
                if !remaining.is_empty() {
                    chunks.push(Chunk {
                        text: remaining.to_string(),
                        index,
                        start,
                        end: len,
                    });
                }
                break;
            }

            let end = self
                .find_break(&chars, start, potential_end)
                .filter(|&b| b > start)
                .unwrap_or(potential_end);

            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(Chunk {
                    text: piece.to_string(),
                    index,
                    start,
                    end,
                });
                index += 1;
            }

            if end >= len {
                break;
            }

            // Back up by the overlap, then slide forward to the next word
            // boundary so the next chunk starts cleanly.
            let overlap_start = (start + 1).max(end.saturating_sub(self.overlap));
            start = match find_char(&chars, ' ', overlap_start, end) {
                Some(space) if space > overlap_start => space + 1,
                _ => overlap_start,
            };
        }

        debug!(
            chunks = chunks.len(),
            max_chunk_size = self.max_chunk_size,
            overlap = self.overlap,
            "text chunked"
        );
        chunks
    }

    /// The preferred cut position inside `[search_start, potential_end)`, or
    /// `None` when only a hard cut remains.
    fn find_break(&self, chars: &[char], start: usize, potential_end: usize) -> Option<usize> {
        let search_start = start.max(potential_end.saturating_sub(300));
        let search_end = potential_end;

        if let Some(p) = rfind(chars, &['\n', '\n'], search_start, search_end)
            && p > start
        {
            return Some(p + 2);
        }

        if let Some(p) = rfind(chars, &['\n'], search_start, search_end)
            && p > start
            && p + 100 > potential_end
        {
            return Some(p + 1);
        }

        for punct in [['.', ' '], ['!', ' '], ['?', ' ']] {
            if let Some(p) = rfind(chars, &punct, search_start, search_end)
                && p > start
            {
                return Some(p + 2);
            }
        }

        if let Some(p) = rfind(chars, &[',', ' '], search_start, search_end)
            && p > start
            && p + 50 > potential_end
        {
            return Some(p + 2);
        }

        if let Some(p) = rfind(chars, &[' '], search_start, search_end)
            && p > start
        {
            return Some(p + 1);
        }

        None
    }
}

/// Rightmost occurrence of `needle` fully inside `[start, end)`.
fn rfind(haystack: &[char], needle: &[char], start: usize, end: usize) -> Option<usize> {
    let end = end.min(haystack.len());
    if needle.is_empty() || start >= end || end - start < needle.len() {
        return None;
    }
    let mut p = end - needle.len();
    loop {
        if haystack[p..p + needle.len()] == *needle {
            return Some(p);
        }
        if p == start {
            return None;
        }
        p -= 1;
    }
}

/// Leftmost occurrence of `needle` inside `[start, end)`.
fn find_char(haystack: &[char], needle: char, start: usize, end: usize) -> Option<usize> {
    let end = end.min(haystack.len());
    if start >= end {
        return None;
    }
    (start..end).find(|&i| haystack[i] == needle)
}
