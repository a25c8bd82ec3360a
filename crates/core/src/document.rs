//! Uploaded documents and their chunked, embedded pieces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::{ActorId, OrgId, TeamId};

/// Opaque document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A contiguous slice of extracted document text.
///
/// Offsets are in Unicode code points, not bytes, so neighbouring chunks can
/// be stitched back together against the extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Zero-based position of the chunk within its document.
    pub index: usize,
    /// Code-point offset of the first character in the extracted text.
    pub start: usize,
    /// Code-point offset one past the last character.
    pub end: usize,
}

/// A stored chunk together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub document: DocumentId,
    pub chunk: Chunk,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

/// Descriptive fields captured at upload time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    pub content_type: String,
    /// Size of the raw upload in bytes.
    pub size_bytes: usize,
    /// Pages for paginated formats, if the parser reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
}

/// An uploaded document owned by a single actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub owner: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrgId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamId>,
    pub metadata: DocumentMetadata,
    /// Full extracted text, retained for re-chunking and context assembly.
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn chunk_count(&self, chunks: &[ChunkRecord]) -> usize {
        chunks.iter().filter(|c| c.document == self.id).count()
    }
}
