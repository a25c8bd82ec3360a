//! Document parsing.
//!
//! Uploads arrive as raw bytes; a [`DocumentParser`] turns them into
//! extracted text ready for chunking. Paginated formats plug in behind the
//! same trait and report a page count.

use tracing::info;

use mnemo_core::{Chunk, Error, Result};

use crate::Chunker;

/// Text extracted from an upload.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub text: String,
    pub page_count: Option<usize>,
}

/// Turns uploaded bytes into extracted text.
pub trait DocumentParser: Send + Sync {
    /// Content types this parser accepts, e.g. `text/plain`.
    fn accepts(&self, content_type: &str) -> bool;

    fn parse(&self, bytes: &[u8], filename: &str) -> Result<ParsedDocument>;
}

/// Parser for plain-text uploads. Bytes must be valid UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn accepts(&self, content_type: &str) -> bool {
        matches!(content_type, "text/plain" | "text/markdown")
    }

    fn parse(&self, bytes: &[u8], filename: &str) -> Result<ParsedDocument> {
        let text = std::str::from_utf8(bytes).map_err(|_| Error::Validation {
            message: format!("{filename} is not valid UTF-8 text"),
        })?;
        Ok(ParsedDocument {
            text: text.to_string(),
            page_count: None,
        })
    }
}

/// Parse then chunk in one step.
pub fn process_document(
    parser: &dyn DocumentParser,
    bytes: &[u8],
    filename: &str,
    chunker: &Chunker,
) -> Result<(ParsedDocument, Vec<Chunk>)> {
    let parsed = parser.parse(bytes, filename)?;
    let chunks = chunker.chunk(&parsed.text);
    info!(
        %filename,
        characters = parsed.text.chars().count(),
        chunks = chunks.len(),
        "document processed"
    );
    Ok((parsed, chunks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_rejects_invalid_utf8() {
        let err = PlainTextParser.parse(&[0xff, 0xfe, 0x00], "notes.txt").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn plain_text_accepts_markdown_type() {
        assert!(PlainTextParser.accepts("text/plain"));
        assert!(PlainTextParser.accepts("text/markdown"));
        assert!(!PlainTextParser.accepts("application/pdf"));
    }

    #[test]
    fn process_document_chunks_parsed_text() {
        let text = "Sentence one. Sentence two. ".repeat(60);
        let (parsed, chunks) =
            process_document(&PlainTextParser, text.as_bytes(), "doc.txt", &Chunker::default())
                .unwrap();
        assert_eq!(parsed.text, text);
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].index, 0);
    }
}
