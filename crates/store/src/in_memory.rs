//! In-memory backend — useful for testing and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use mnemo_core::{
    Actor, ActorId, ActorStore, ChunkRecord, Conversation, ConversationId,
    ConversationStore, Document, DocumentId, DocumentStore, MemoryRecord, ProfileFacts,
    ProfileStore, RecordStore, Result, Role, ScoredRecord,
};

use crate::vector::relevance;

#[derive(Default)]
pub struct InMemoryActorStore {
    actors: Arc<RwLock<HashMap<ActorId, Actor>>>,
}

impl InMemoryActorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActorStore for InMemoryActorStore {
    async fn upsert(&self, actor: Actor) -> Result<()> {
        self.actors.write().await.insert(actor.id.clone(), actor);
        Ok(())
    }

    async fn get(&self, id: &ActorId) -> Result<Option<Actor>> {
        Ok(self.actors.read().await.get(id).cloned())
    }

    async fn super_admin(&self) -> Result<Option<Actor>> {
        Ok(self
            .actors
            .read()
            .await
            .values()
            .find(|a| a.role == Role::SuperAdmin)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: Arc<RwLock<HashMap<ConversationId, Conversation>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn upsert(&self, conversation: Conversation) -> Result<()> {
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }

    async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        Ok(self.conversations.read().await.get(id).cloned())
    }

    async fn list_for_owner(&self, owner: &ActorId) -> Result<Vec<Conversation>> {
        let conversations = self.conversations.read().await;
        let mut owned: Vec<Conversation> = conversations
            .values()
            .filter(|c| c.owner == *owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn all_attachment_ids(&self) -> Result<Vec<DocumentId>> {
        let conversations = self.conversations.read().await;
        let mut ids = Vec::new();
        for conversation in conversations.values() {
            for id in conversation.attachment_ids() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<Vec<MemoryRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn upsert(&self, record: MemoryRecord) -> Result<()> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.conversation == record.conversation) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    async fn get_by_conversation(&self, id: &ConversationId) -> Result<Option<MemoryRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.conversation == *id).cloned())
    }

    async fn vector_query(
        &self,
        query: &[f32],
        k: usize,
        visible: &(dyn for<'a> Fn(&'a MemoryRecord) -> bool + Sync),
    ) -> Result<Vec<ScoredRecord>> {
        let records = self.records.read().await;

        // Visibility is applied before ranking so hidden records never
        // occupy top-k slots.
        let mut scored: Vec<ScoredRecord> = records
            .iter()
            .filter(|r| r.embedding.is_some() && visible(r))
            .map(|r| ScoredRecord {
                similarity: relevance(r.embedding.as_deref().unwrap_or(&[]), query),
                record: r.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.record.created_at.cmp(&a.record.created_at))
        });
        scored.truncate(k);
        debug!(
            candidates = records.len(),
            returned = scored.len(),
            "vector query served"
        );
        Ok(scored)
    }
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<Vec<(Document, Vec<ChunkRecord>)>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put(&self, document: Document, chunks: Vec<ChunkRecord>) -> Result<()> {
        let mut documents = self.documents.write().await;
        documents.retain(|(d, _)| d.id != document.id);
        documents.push((document, chunks));
        Ok(())
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|(d, _)| d.id == *id).map(|(d, _)| d.clone()))
    }

    async fn chunks(&self, id: &DocumentId) -> Result<Vec<ChunkRecord>> {
        let documents = self.documents.read().await;
        let mut chunks: Vec<ChunkRecord> = documents
            .iter()
            .find(|(d, _)| d.id == *id)
            .map(|(_, c)| c.clone())
            .unwrap_or_default();
        chunks.sort_by_key(|c| c.chunk.index);
        Ok(chunks)
    }

    async fn latest_orphaned(
        &self,
        owner: &ActorId,
        referenced: &[DocumentId],
    ) -> Result<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|(d, _)| d.owner == *owner && !referenced.contains(&d.id))
            .max_by_key(|(d, _)| d.created_at)
            .map(|(d, _)| d.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<HashMap<ActorId, ProfileFacts>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, owner: &ActorId) -> Result<Option<ProfileFacts>> {
        Ok(self.profiles.read().await.get(owner).cloned())
    }

    async fn put(&self, facts: ProfileFacts) -> Result<()> {
        self.profiles.write().await.insert(facts.owner.clone(), facts);
        Ok(())
    }
}
