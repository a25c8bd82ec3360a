//! The memory service facade.
//!
//! Single entry point consumed by the routing layer: turn handling,
//! attachment upload, sharing-scope changes, and per-conversation document
//! access. Everything else in this crate hangs off it.

use std::sync::Arc;

use mnemo_access::can_access_conversation;
use mnemo_chunker::{Chunker, DocumentParser, process_document};
use mnemo_config::AppConfig;
use mnemo_core::{
    Actor, ActorStore, ChunkRecord, CompletionRequest, Conversation, ConversationId,
    ConversationStore, Document, DocumentId, DocumentMetadata, DocumentStore, Error,
    ModelClient, ProfileStore, RecordStore, Result, RetryPolicy, Role, ScopeError, SharingScope,
    Turn,
};
use tracing::{info, warn};

use crate::context::ContextAssembler;
use crate::lifecycle::ChatLifecycleCoordinator;
use crate::retrieval::RetrievalEngine;

/// Storage backends the service operates over.
#[derive(Clone)]
pub struct Stores {
    pub actors: Arc<dyn ActorStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub records: Arc<dyn RecordStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub profiles: Arc<dyn ProfileStore>,
}

/// Result of one handled turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub conversation_id: ConversationId,
    pub assistant_text: String,
    /// Document attached to this turn, either explicitly or auto-claimed.
    pub attachment_used: Option<DocumentId>,
}

/// Result of an attachment upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub document_id: DocumentId,
    pub chunk_count: usize,
}

pub struct MemoryService {
    stores: Stores,
    model: Arc<dyn ModelClient>,
    parser: Arc<dyn DocumentParser>,
    chunker: Chunker,
    assembler: ContextAssembler,
    lifecycle: ChatLifecycleCoordinator,
    max_upload_bytes: usize,
}

impl MemoryService {
    pub fn new(
        model: Arc<dyn ModelClient>,
        parser: Arc<dyn DocumentParser>,
        stores: Stores,
        config: &AppConfig,
    ) -> Self {
        let retrieval = Arc::new(RetrievalEngine::new(
            Arc::clone(&model),
            Arc::clone(&stores.records),
            config.retrieval.top_k,
            config.retrieval.similarity_threshold,
        ));
        let assembler = ContextAssembler::new(
            Arc::clone(&stores.profiles),
            Arc::clone(&stores.conversations),
            Arc::clone(&stores.documents),
            retrieval,
            config.context.recent_messages_limit,
            config.context.max_document_chunks,
            config.context.profile_facts_limit,
        );
        let lifecycle = ChatLifecycleCoordinator::new(
            Arc::clone(&model),
            Arc::clone(&stores.records),
            Arc::clone(&stores.profiles),
            RetryPolicy::new(
                config.retry.max_attempts,
                std::time::Duration::from_millis(config.retry.delay_ms),
            ),
        );
        let chunker = Chunker::new(config.chunking.max_chunk_size, config.chunking.overlap);

        Self {
            stores,
            model,
            parser,
            chunker,
            assembler,
            lifecycle,
            max_upload_bytes: config.upload.max_bytes,
        }
    }

    /// Handle one user turn end-to-end.
    ///
    /// With no conversation ID, a fresh conversation is opened; the actor's
    /// most recent prior conversation is finalized first. Appending to an
    /// existing conversation is owner-only.
    pub async fn handle_turn(
        &self,
        actor: &Actor,
        conversation_id: Option<&ConversationId>,
        text: &str,
        attachment_id: Option<&DocumentId>,
    ) -> Result<TurnOutcome> {
        if text.trim().is_empty() {
            return Err(Error::validation("message text must not be empty"));
        }
        let actor = &self.register_actor(actor).await?;

        let mut conversation = match conversation_id {
            Some(id) => {
                let conversation = self
                    .stores
                    .conversations
                    .get(id)
                    .await?
                    .ok_or_else(|| Error::not_found("conversation", id.to_string()))?;
                if conversation.owner != actor.id {
                    return Err(ScopeError::Denied {
                        actor: actor.id.to_string(),
                        resource: format!("conversation {id}"),
                    }
                    .into());
                }
                conversation
            }
            None => self.open_conversation(actor).await?,
        };

        let attachment = self.resolve_attachment(actor, attachment_id).await?;
        conversation
            .turns
            .push(Turn::pending(text, attachment.clone()));
        self.stores.conversations.upsert(conversation.clone()).await?;

        let messages = self.assembler.assemble(actor, &conversation, text).await?;
        let response = self
            .model
            .complete(CompletionRequest::new(messages).with_temperature(0.7))
            .await?;

        if let Some(turn) = conversation.turns.last_mut() {
            turn.assistant_text = response.content.clone();
        }
        self.stores.conversations.upsert(conversation.clone()).await?;

        info!(
            actor = %actor.id,
            conversation = %conversation.id.short(),
            attachment = attachment.is_some(),
            "turn completed"
        );
        Ok(TurnOutcome {
            conversation_id: conversation.id,
            assistant_text: response.content,
            attachment_used: attachment,
        })
    }

    /// Parse, chunk, embed and store an uploaded document.
    pub async fn handle_attachment_upload(
        &self,
        actor: &Actor,
        bytes: &[u8],
        filename: &str,
    ) -> Result<UploadOutcome> {
        if bytes.len() > self.max_upload_bytes {
            return Err(Error::validation(format!(
                "upload of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.max_upload_bytes
            )));
        }
        let actor = &self.register_actor(actor).await?;

        let (parsed, chunks) = process_document(self.parser.as_ref(), bytes, filename, &self.chunker)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.model.embed(&texts).await?
        };

        let document = Document {
            id: DocumentId::new(),
            owner: actor.id.clone(),
            organization: actor.organization.clone(),
            team: actor.team.clone(),
            metadata: DocumentMetadata {
                filename: filename.to_string(),
                content_type: content_type_for(filename).to_string(),
                size_bytes: bytes.len(),
                page_count: parsed.page_count,
            },
            text: parsed.text,
            created_at: chrono::Utc::now(),
        };
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors.into_iter().map(Some).chain(std::iter::repeat(None)))
            .map(|(chunk, embedding)| ChunkRecord {
                document: document.id.clone(),
                chunk,
                embedding,
            })
            .collect();
        let chunk_count = records.len();
        let document_id = document.id.clone();
        self.stores.documents.put(document, records).await?;

        info!(
            actor = %actor.id,
            %filename,
            document = %document_id,
            chunks = chunk_count,
            "document uploaded"
        );
        Ok(UploadOutcome {
            document_id,
            chunk_count,
        })
    }

    /// Change a conversation's sharing scope. Owner or super admin only.
    pub async fn set_sharing_scope(
        &self,
        actor: &Actor,
        conversation_id: &ConversationId,
        scope: SharingScope,
    ) -> Result<()> {
        let actor = &self.register_actor(actor).await?;
        let mut record = self
            .stores
            .records
            .get_by_conversation(conversation_id)
            .await?
            .ok_or_else(|| Error::not_found("conversation", conversation_id.to_string()))?;

        if record.owner != actor.id && actor.role != Role::SuperAdmin {
            return Err(ScopeError::Denied {
                actor: actor.id.to_string(),
                resource: format!("conversation {conversation_id}"),
            }
            .into());
        }

        record.sharing = scope;
        record.shared_at = match scope {
            SharingScope::Organization => Some(chrono::Utc::now()),
            SharingScope::Private => None,
        };
        self.stores.records.upsert(record).await?;
        info!(actor = %actor.id, conversation = %conversation_id.short(), %scope, "sharing scope updated");
        Ok(())
    }

    /// Documents attached to a conversation, with their chunks, for any
    /// actor the access rules let see that conversation.
    pub async fn conversation_documents(
        &self,
        actor: &Actor,
        conversation_id: &ConversationId,
    ) -> Result<Vec<(Document, Vec<ChunkRecord>)>> {
        let actor = &self.register_actor(actor).await?;
        let record = self
            .stores
            .records
            .get_by_conversation(conversation_id)
            .await?
            .ok_or_else(|| Error::not_found("conversation", conversation_id.to_string()))?;
        can_access_conversation(actor, &record)?;

        let Some(conversation) = self.stores.conversations.get(conversation_id).await? else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for id in conversation.attachment_ids() {
            if let Some(document) = self.stores.documents.get(&id).await? {
                let chunks = self.stores.documents.chunks(&id).await?;
                out.push((document, chunks));
            }
        }
        Ok(out)
    }

    /// Record the actor, keeping the super admin role unique: while one
    /// actor holds it, any other actor claiming it is downgraded to member.
    async fn register_actor(&self, actor: &Actor) -> Result<Actor> {
        let mut actor = actor.clone();
        if actor.role == Role::SuperAdmin
            && let Some(holder) = self.stores.actors.super_admin().await?
            && holder.id != actor.id
        {
            warn!(
                actor = %actor.id,
                holder = %holder.id,
                "super admin role already held, downgrading to member"
            );
            actor.role = Role::Member;
        }
        self.stores.actors.upsert(actor.clone()).await?;
        Ok(actor)
    }

    /// Open a new conversation, finalizing the most recent prior one first.
    async fn open_conversation(&self, actor: &Actor) -> Result<Conversation> {
        let previous = self
            .stores
            .conversations
            .list_for_owner(&actor.id)
            .await?
            .into_iter()
            .next();
        if let Some(previous) = previous
            && let Err(err) = self.lifecycle.finalize(actor, &previous).await
        {
            warn!(
                conversation = %previous.id.short(),
                %err,
                "failed to finalize previous conversation, continuing"
            );
        }

        let conversation = Conversation::new(
            ConversationId::new(),
            actor.id.clone(),
            actor.organization.clone(),
            actor.team.clone(),
        );
        self.stores.conversations.upsert(conversation.clone()).await?;
        self.lifecycle
            .open(&conversation.id, actor, SharingScope::Private)
            .await?;
        Ok(conversation)
    }

    /// Resolve the document for this turn: the explicit ID when given, else
    /// the actor's most recent upload that no turn has claimed yet.
    async fn resolve_attachment(
        &self,
        actor: &Actor,
        attachment_id: Option<&DocumentId>,
    ) -> Result<Option<DocumentId>> {
        if let Some(id) = attachment_id {
            let document = self
                .stores
                .documents
                .get(id)
                .await?
                .ok_or_else(|| Error::not_found("document", id.to_string()))?;
            if document.owner != actor.id {
                return Err(ScopeError::Denied {
                    actor: actor.id.to_string(),
                    resource: format!("document {id}"),
                }
                .into());
            }
            return Ok(Some(document.id));
        }

        let referenced = self.stores.conversations.all_attachment_ids().await?;
        let orphan = self
            .stores
            .documents
            .latest_orphaned(&actor.id, &referenced)
            .await?;
        if let Some(document) = &orphan {
            info!(
                actor = %actor.id,
                document = %document.id,
                filename = %document.metadata.filename,
                "claimed unattached upload for this turn"
            );
        }
        Ok(orphan.map(|d| d.id))
    }
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("md") | Some("markdown") => "text/markdown",
        Some("pdf") => "application/pdf",
        _ => "text/plain",
    }
}
