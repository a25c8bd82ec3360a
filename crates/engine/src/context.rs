//! Deterministic prompt-context assembly.
//!
//! Merges profile facts, attached document chunks, retrieved historical
//! summaries, and the recent-turn window into one ordered message list.
//! Section order is fixed: earlier sections anchor the model's priorities,
//! and the pending user turn always comes last.

use std::sync::Arc;

use mnemo_access::ScopeFilter;
use mnemo_core::{
    Actor, ChatMessage, Conversation, ConversationStore, DocumentId, DocumentStore, ProfileFacts,
    ProfileStore, Result,
};
use tracing::{debug, info};

use crate::retrieval::{RankedRecord, RetrievalEngine};

/// Query terms that signal the user is asking about past chats rather than
/// about document content.
const CHAT_QUERY_TERMS: [&str; 6] = [
    "chat",
    "conversation",
    "discussion",
    "talked about",
    "discussed",
    "mentioned",
];

/// Builds the ordered prompt payload for one pending user turn.
pub struct ContextAssembler {
    profiles: Arc<dyn ProfileStore>,
    conversations: Arc<dyn ConversationStore>,
    documents: Arc<dyn DocumentStore>,
    retrieval: Arc<RetrievalEngine>,

    /// Completed turns of the current conversation included verbatim.
    recent_turns_limit: usize,

    /// Ceiling on rendered document chunks. A safety valve, not a budget.
    max_document_chunks: usize,

    /// Per-list cap when rendering profile facts, preferences and topics.
    profile_items_limit: usize,
}

impl ContextAssembler {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        conversations: Arc<dyn ConversationStore>,
        documents: Arc<dyn DocumentStore>,
        retrieval: Arc<RetrievalEngine>,
        recent_turns_limit: usize,
        max_document_chunks: usize,
        profile_items_limit: usize,
    ) -> Self {
        Self {
            profiles,
            conversations,
            documents,
            retrieval,
            recent_turns_limit,
            max_document_chunks,
            profile_items_limit,
        }
    }

    /// Assemble the full message list for `pending_text`.
    ///
    /// Order: profile facts, attached document, retrieved historical context,
    /// recent completed turns, then the pending user message.
    pub async fn assemble(
        &self,
        actor: &Actor,
        conversation: &Conversation,
        pending_text: &str,
    ) -> Result<Vec<ChatMessage>> {
        let mut messages = Vec::new();

        // 1. Profile facts.
        if let Some(profile) = self.profiles.get(&actor.id).await? {
            let rendered = render_profile(&profile, self.profile_items_limit);
            if !rendered.is_empty() {
                messages.push(ChatMessage::system(format!(
                    "You are a helpful assistant. Here are important facts about the user:\n{rendered}"
                )));
                debug!(actor = %actor.id, "profile facts added to context");
            }
        }

        // 2. Documents attached to the current conversation.
        let attached = conversation.attachment_ids();
        let document_present = if let Some(chunk_text) = self.document_context(&attached).await? {
            messages.push(ChatMessage::system(attached_document_message(&chunk_text)));
            info!(
                conversation = %conversation.id.short(),
                documents = attached.len(),
                "attached document content added to context"
            );
            true
        } else {
            false
        };

        // 3. Retrieved historical summaries, excluding this conversation.
        let ranked = self
            .retrieval
            .retrieve(pending_text, actor, Some(&conversation.id))
            .await?;
        if !ranked.is_empty() {
            let (context_text, historical_documents) =
                self.render_historical(&ranked).await?;
            let scope_note = scope_note(actor);
            let chat_query = is_chat_query(pending_text);

            let instruction = if (document_present || historical_documents) && !chat_query {
                if document_present {
                    document_priority_framing(&context_text, &scope_note)
                } else {
                    generic_framing_with_documents(&context_text, &scope_note)
                }
            } else if chat_query {
                if historical_documents {
                    chat_listing_framing_with_documents(&context_text, &scope_note)
                } else {
                    chat_listing_framing(&context_text, &scope_note)
                }
            } else {
                generic_framing(&context_text, &scope_note)
            };
            messages.push(ChatMessage::system(instruction));
        }

        // 4. Recent completed turns, oldest first. The in-flight turn has an
        // empty assistant reply and is excluded so the pending message is
        // never duplicated.
        let completed: Vec<_> = conversation.completed_turns().collect();
        let skip = completed.len().saturating_sub(self.recent_turns_limit);
        for turn in completed.into_iter().skip(skip) {
            messages.push(ChatMessage::user(turn.user_text.clone()));
            messages.push(ChatMessage::assistant(turn.assistant_text.clone()));
        }

        // 5. The pending user turn, always last.
        messages.push(ChatMessage::user(pending_text));

        info!(
            actor = %actor.id,
            conversation = %conversation.id.short(),
            sections = messages.len(),
            retrieved = ranked.len(),
            "context assembled"
        );
        Ok(messages)
    }

    /// Render all chunks of the given documents, grouped by filename and
    /// ordered by chunk index, capped at the configured ceiling.
    async fn document_context(&self, ids: &[DocumentId]) -> Result<Option<String>> {
        let mut entries: Vec<(String, usize, String)> = Vec::new();
        for id in ids {
            let Some(document) = self.documents.get(id).await? else {
                continue;
            };
            for record in self.documents.chunks(id).await? {
                entries.push((
                    document.metadata.filename.clone(),
                    record.chunk.index,
                    record.chunk.text,
                ));
            }
        }
        if entries.is_empty() {
            return Ok(None);
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        entries.truncate(self.max_document_chunks);

        let mut parts: Vec<String> = Vec::new();
        let mut current: Option<&str> = None;
        for (filename, index, text) in &entries {
            if current != Some(filename.as_str()) {
                parts.push(format!("\n[Document: {filename}]\n"));
                current = Some(filename.as_str());
            }
            parts.push(format!("[Chunk {}]\n{text}", index + 1));
        }
        Ok(Some(parts.join("\n\n")))
    }

    /// Render retrieved records as numbered chat sections, appending the
    /// chunk text of any document reachable beneath a visible record.
    /// Returns the rendered text and whether any document content was found.
    async fn render_historical(&self, ranked: &[RankedRecord]) -> Result<(String, bool)> {
        let mut parts: Vec<String> = Vec::new();
        let mut any_documents = false;

        for (idx, item) in ranked.iter().enumerate() {
            let record = &item.record;
            let summary = if record.summary.is_empty() {
                "No summary available"
            } else {
                record.summary.as_str()
            };
            let mut section = format!(
                "--- Chat {} (ID: {}, User: {}) ---\n{summary}",
                idx + 1,
                record.conversation.short(),
                record.owner,
            );

            if let Some(historical) = self.conversations.get(&record.conversation).await?
                && let Some(chunk_text) = self.document_context(&historical.attachment_ids()).await?
            {
                let bar = "=".repeat(80);
                section.push_str(&format!(
                    "\n\n{bar}\nDOCUMENT CONTENT (PRIMARY INFORMATION SOURCE):\n{bar}\n{chunk_text}\n{bar}"
                ));
                any_documents = true;
            }
            parts.push(section);
        }

        Ok((parts.join("\n\n"), any_documents))
    }
}

fn is_chat_query(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CHAT_QUERY_TERMS.iter().any(|term| lowered.contains(term))
}

/// Role-appropriate note on where retrieved chats come from, rendered
/// inline after "summaries". Empty when the actor has no usable scope.
fn scope_note(actor: &Actor) -> String {
    match ScopeFilter::for_actor(actor) {
        Ok(filter) => format!(" ({})", filter.describe()),
        Err(_) => String::new(),
    }
}

/// Render profile lists as labelled lines, each capped at `limit` items.
fn render_profile(profile: &ProfileFacts, limit: usize) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !profile.facts.is_empty() {
        let facts: Vec<&str> = profile.facts.iter().take(limit).map(String::as_str).collect();
        parts.push(format!("Important facts: {}", facts.join(", ")));
    }
    if !profile.preferences.is_empty() {
        let prefs: Vec<String> = profile
            .preferences
            .iter()
            .take(limit)
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        parts.push(format!("Preferences: {}", prefs.join(", ")));
    }
    if !profile.topics.is_empty() {
        let topics: Vec<&str> = profile.topics.iter().take(limit).map(String::as_str).collect();
        parts.push(format!("Topics of interest: {}", topics.join(", ")));
    }

    parts.join("\n")
}

fn attached_document_message(chunk_text: &str) -> String {
    format!(
        "CRITICAL: A document has been uploaded to this chat. The document content is provided below.\n\
         \n\
         ABSOLUTE PRIORITY RULES:\n\
         1. When the user says \"summarize it\", \"summarize this\", \"summarize the document\", \"summarize\", or any similar phrase, they are referring to THIS DOCUMENT below, NOT the conversation history.\n\
         2. The document content takes ABSOLUTE PRIORITY over any conversation history when answering questions.\n\
         3. If the user asks to summarize something, you MUST summarize THIS DOCUMENT.\n\
         4. Use the document information to answer all questions accurately.\n\
         5. When ambiguous phrases like \"it\" or \"this\" are used, always interpret them as referring to THIS DOCUMENT.\n\
         \n\
         DOCUMENT CONTENT:\n\
         {chunk_text}\n\
         \n\
         CRITICAL REMINDER: When the user asks to \"summarize it\" or similar, they mean THIS DOCUMENT, not the conversation history. Always prioritize the document."
    )
}

fn document_priority_framing(context_text: &str, scope_note: &str) -> String {
    format!(
        "MEMORY CONTEXT - DOCUMENT WITH HISTORICAL CONTEXT\n\
         \n\
         CRITICAL: A document has been uploaded to this chat (see the DOCUMENT CONTENT in the previous system message).\n\
         \n\
         PRIORITY RULES:\n\
         1. DOCUMENT TAKES ABSOLUTE PRIORITY: when the user says \"summarize it\", \"summarize this\", \"summarize the document\", or similar phrases, they are referring to THE DOCUMENT, NOT these conversation summaries.\n\
         2. DOCUMENT FIRST: the document content takes absolute priority over conversation history when the user asks to summarize or asks questions about the document.\n\
         3. HISTORICAL CONTEXT FOR SUPPORT: use the conversation summaries below only for additional context or background information, not as the primary source.\n\
         \n\
         ADDITIONAL CONTEXT - PAST CONVERSATION SUMMARIES{scope_note}:\n\
         {context_text}\n\
         \n\
         REMEMBER:\n\
         - If the user asks to \"summarize it\" or similar, summarize THE DOCUMENT from the previous system message\n\
         - Use historical context only to provide additional insights or related information\n\
         - The document is the primary source of truth for document-related queries"
    )
}

fn chat_listing_framing(context_text: &str, scope_note: &str) -> String {
    format!(
        "MEMORY CONTEXT - CHAT/CONVERSATION QUERY\n\
         \n\
         The user is asking about past chats/conversations. Below are the relevant chat summaries{scope_note} that match their query.\n\
         \n\
         CRITICAL INSTRUCTIONS:\n\
         1. THESE ARE THE CHATS: the summaries below ARE the chats the user is asking about. You have direct access to them.\n\
         2. EXTRACT AND PRESENT: extract and present the key information from each chat summary clearly.\n\
         3. SPECIFIC INFORMATION REQUESTS: if the user asks for specific information, extract that exact information from these summaries.\n\
         4. COMPREHENSIVE RESPONSE: provide a well-structured, professional response that answers their question completely.\n\
         5. DO NOT SAY \"I DON'T HAVE ACCESS\": you DO have access - use the information below to answer.\n\
         \n\
         RELEVANT CHAT SUMMARIES:\n\
         {context_text}\n\
         \n\
         RESPONSE REQUIREMENTS:\n\
         - Use ALL relevant information from the summaries above\n\
         - Format your response professionally\n\
         - If information appears in multiple chats, synthesize it intelligently"
    )
}

fn chat_listing_framing_with_documents(context_text: &str, scope_note: &str) -> String {
    format!(
        "MEMORY CONTEXT - CHAT/CONVERSATION QUERY WITH DOCUMENTS\n\
         \n\
         The user is asking about past chats/conversations. Below are the relevant chat summaries{scope_note} that match their query. Document content with detailed information is included.\n\
         \n\
         CRITICAL INSTRUCTIONS:\n\
         1. THESE ARE THE CHATS: the summaries below ARE the chats the user is asking about. You have direct access to them.\n\
         2. DOCUMENTS CONTAIN THE INFORMATION: document content is provided below (marked with \"DOCUMENT CONTENT\") and contains the most detailed information. Extract requested specifics directly from it.\n\
         3. EXTRACT FROM DOCUMENTS FIRST: the document content is your primary source of detailed information.\n\
         4. COMPREHENSIVE RESPONSE: use ALL information from both summaries and documents, formatted professionally.\n\
         5. DO NOT SAY \"I DON'T HAVE ACCESS\": you have the documents below with the information.\n\
         \n\
         RELEVANT CHAT SUMMARIES WITH DOCUMENTS:\n\
         {context_text}\n\
         \n\
         RESPONSE REQUIREMENTS:\n\
         - Extract information from the DOCUMENT CONTENT sections; they contain the detailed information\n\
         - Use ALL relevant information from summaries and documents\n\
         - Be comprehensive, specific and professionally formatted"
    )
}

fn generic_framing(context_text: &str, scope_note: &str) -> String {
    format!(
        "MEMORY CONTEXT\n\
         \n\
         You have access to relevant past conversation summaries{scope_note} that contain information related to the user's current question.\n\
         \n\
         CRITICAL INSTRUCTIONS:\n\
         1. ALWAYS USE THE PROVIDED CONTEXT: the information below is from past conversations and is highly relevant to the question.\n\
         2. EXTRACT AND PRESENT INFORMATION CLEARLY: read through all summaries carefully and extract the specific information requested.\n\
         3. PROVIDE COMPREHENSIVE ANSWERS: use ALL available information from the context below.\n\
         4. DO NOT SAY \"I DON'T HAVE ACCESS\": you have direct access to the information below.\n\
         5. COMBINE INFORMATION INTELLIGENTLY: if information appears in multiple summaries, synthesize it into a coherent answer.\n\
         \n\
         RELEVANT CONVERSATION SUMMARIES:\n\
         {context_text}\n\
         \n\
         RESPONSE REQUIREMENTS:\n\
         - Answer the user's question using ONLY the information provided above\n\
         - If information is not in the summaries, acknowledge that but still provide what you can\n\
         - Format your response in a clear, professional manner"
    )
}

fn generic_framing_with_documents(context_text: &str, scope_note: &str) -> String {
    format!(
        "MEMORY CONTEXT - WITH DOCUMENTS\n\
         \n\
         You have access to relevant past conversation summaries{scope_note} that contain information related to the user's current question. Document content with detailed information is included below.\n\
         \n\
         CRITICAL INSTRUCTIONS:\n\
         1. DOCUMENTS ARE YOUR PRIMARY SOURCE: document content is provided below (marked with \"DOCUMENT CONTENT\") and contains the most detailed and accurate information. Always extract from it first.\n\
         2. EXTRACT INFORMATION FROM DOCUMENTS: when the user asks for specific information, extract it directly from the document content. Do not say you lack access; the document content IS your access.\n\
         3. USE ALL AVAILABLE INFORMATION: use both conversation summaries and documents; where they overlap, prefer the document content.\n\
         4. PROVIDE COMPREHENSIVE ANSWERS: extract all relevant information and format it professionally.\n\
         \n\
         RELEVANT CONVERSATION SUMMARIES WITH DOCUMENTS:\n\
         {context_text}\n\
         \n\
         RESPONSE REQUIREMENTS:\n\
         - Extract information from the DOCUMENT CONTENT sections; they contain the detail you need\n\
         - Answer using ALL information from documents and summaries\n\
         - Be specific, detailed and professionally formatted"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::ActorId;
    use std::collections::BTreeMap;

    #[test]
    fn chat_query_terms_detected() {
        assert!(is_chat_query("What did we talk about in our last Conversation?"));
        assert!(is_chat_query("list the things I mentioned"));
        assert!(!is_chat_query("summarize the document"));
    }

    #[test]
    fn profile_rendering_caps_each_list() {
        let mut profile = ProfileFacts::new(ActorId::new("alice"));
        profile.facts = (0..15).map(|i| format!("fact {i}")).collect();
        profile.preferences =
            BTreeMap::from([("tone".to_string(), "formal".to_string())]);
        profile.topics = vec!["rust".to_string()];

        let rendered = render_profile(&profile, 10);
        assert!(rendered.contains("fact 9"));
        assert!(!rendered.contains("fact 10"));
        assert!(rendered.contains("Preferences: tone: formal"));
        assert!(rendered.contains("Topics of interest: rust"));
    }

    #[test]
    fn empty_profile_renders_empty() {
        let profile = ProfileFacts::new(ActorId::new("alice"));
        assert!(render_profile(&profile, 10).is_empty());
    }
}
