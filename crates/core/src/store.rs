//! Storage traits.
//!
//! The engine depends only on these traits; the in-memory backend lives in
//! its own crate, and other backends can be slotted in without touching the
//! engine. All methods take `&self`; implementations handle their own
//! interior locking.

use async_trait::async_trait;

use crate::actor::{Actor, ActorId};
use crate::conversation::{Conversation, ConversationId};
use crate::document::{ChunkRecord, Document, DocumentId};
use crate::error::Result;
use crate::profile::ProfileFacts;
use crate::record::MemoryRecord;

/// A record paired with its cosine similarity to the query vector.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    /// Cosine similarity clamped to `[0, 1]`.
    pub similarity: f32,
}

#[async_trait]
pub trait ActorStore: Send + Sync {
    async fn upsert(&self, actor: Actor) -> Result<()>;
    async fn get(&self, id: &ActorId) -> Result<Option<Actor>>;

    /// The actor currently holding the super admin role, if any. At most
    /// one actor holds it at a time.
    async fn super_admin(&self) -> Result<Option<Actor>>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn upsert(&self, conversation: Conversation) -> Result<()>;
    async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>>;

    /// Conversations owned by `owner`, most recently created first.
    async fn list_for_owner(&self, owner: &ActorId) -> Result<Vec<Conversation>>;

    /// Every document ID referenced by any turn of any conversation. Used to
    /// detect uploads that no turn has claimed yet.
    async fn all_attachment_ids(&self) -> Result<Vec<DocumentId>>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace by conversation ID.
    async fn upsert(&self, record: MemoryRecord) -> Result<()>;
    async fn get_by_conversation(&self, id: &ConversationId) -> Result<Option<MemoryRecord>>;

    /// Top-`k` visible records by cosine similarity to `query`.
    ///
    /// `visible` is evaluated before ranking, so hidden records never crowd
    /// out visible ones. Results are ordered by similarity descending with
    /// `created_at` descending as the tie-break.
    async fn vector_query(
        &self,
        query: &[f32],
        k: usize,
        visible: &(dyn for<'a> Fn(&'a MemoryRecord) -> bool + Sync),
    ) -> Result<Vec<ScoredRecord>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, document: Document, chunks: Vec<ChunkRecord>) -> Result<()>;
    async fn get(&self, id: &DocumentId) -> Result<Option<Document>>;
    async fn chunks(&self, id: &DocumentId) -> Result<Vec<ChunkRecord>>;

    /// The most recently uploaded document owned by `owner` whose ID is not
    /// in `referenced`, if any.
    async fn latest_orphaned(
        &self,
        owner: &ActorId,
        referenced: &[DocumentId],
    ) -> Result<Option<Document>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, owner: &ActorId) -> Result<Option<ProfileFacts>>;
    async fn put(&self, facts: ProfileFacts) -> Result<()>;
}
