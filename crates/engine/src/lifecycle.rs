//! Conversation-boundary handling.
//!
//! When an actor opens a new conversation, their most recent prior
//! conversation is finalized exactly once: summarized, embedded, and folded
//! into the profile. Finalization is idempotent via a check on the stored
//! record, and degrades instead of failing: a summary without a vector is
//! kept, and a failed profile merge never rolls anything back.

use std::sync::Arc;

use mnemo_core::{
    Actor, ChatMessage, CompletionRequest, Conversation, ConversationId, MemoryRecord,
    ModelClient, ProfileDelta, ProfileFacts, ProfileStore, RecordStore, Result, RetryPolicy,
    SharingScope,
};
use tracing::{debug, info, warn};

const SUMMARIZER_SYSTEM_PROMPT: &str = "\
You are a fact-preserving summarizer that works with ANY type of document or conversation.
Your summaries MUST preserve ALL specific factual details, regardless of document type (resume, proposal, technical doc, business plan, research paper, contract, etc.).

ALWAYS include:
- Exact names (people, organizations, places, products, services, entities) - use EXACT names as mentioned
- Precise numbers (scores, percentages, amounts, quantities, measurements, dates, years) - use EXACT values
- Specific qualifications, credentials, certifications, degrees - COMPLETE details
- Technical specifications, requirements, conditions, terms - EXACT wording where important
- Projects, work items, tasks, deliverables, milestones - SPECIFIC information
- Key facts, claims, statements, findings - PRESERVE precision
- Any other factual details that might be queried later

Do NOT generalize or use vague terms. If a value is mentioned, preserve it exactly.
Do NOT say \"high scores\" if the actual score is mentioned - use the exact value.
Preserve specific names, dates, numbers, and facts with precision.
Create a comprehensive summary that maintains factual accuracy while being concise.";

const EXTRACTOR_SYSTEM_PROMPT: &str =
    "You extract structured information from text. Return only valid JSON.";

/// Drives the Open -> Closing -> Open transition for one actor's chats.
pub struct ChatLifecycleCoordinator {
    model: Arc<dyn ModelClient>,
    records: Arc<dyn RecordStore>,
    profiles: Arc<dyn ProfileStore>,
    retry: RetryPolicy,
}

impl ChatLifecycleCoordinator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        records: Arc<dyn RecordStore>,
        profiles: Arc<dyn ProfileStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            model,
            records,
            profiles,
            retry,
        }
    }

    /// Write the placeholder record for a newly opened conversation, unless
    /// one already exists.
    pub async fn open(
        &self,
        conversation: &ConversationId,
        actor: &Actor,
        sharing: SharingScope,
    ) -> Result<()> {
        if self.records.get_by_conversation(conversation).await?.is_some() {
            return Ok(());
        }
        let record = MemoryRecord::placeholder(conversation.clone(), actor, sharing);
        self.records.upsert(record).await?;
        info!(conversation = %conversation.short(), %sharing, "placeholder record created");
        Ok(())
    }

    /// Finalize a conversation: summarize, embed, and merge into the profile.
    ///
    /// A no-op when the record already holds both summary text and a vector,
    /// so closing the same conversation twice produces exactly one summary.
    pub async fn finalize(&self, actor: &Actor, conversation: &Conversation) -> Result<()> {
        if conversation.turns.is_empty() {
            debug!(conversation = %conversation.id.short(), "no turns, skipping finalization");
            return Ok(());
        }

        let existing = self.records.get_by_conversation(&conversation.id).await?;
        if let Some(record) = &existing
            && record.has_summary()
        {
            info!(conversation = %conversation.id.short(), "summary already stored, skipping");
            return Ok(());
        }

        let summary = self.summarize(conversation).await?;

        // Preserve the placeholder's sharing scope; fill hierarchy tags from
        // the actor only where the placeholder left them unset.
        let mut record = existing.unwrap_or_else(|| {
            MemoryRecord::placeholder(conversation.id.clone(), actor, SharingScope::Private)
        });
        record.summary = summary.clone();
        if record.organization.is_none() {
            record.organization = actor.organization.clone();
        }
        if record.team.is_none() {
            record.team = actor.team.clone();
        }
        record.metadata.insert(
            "turn_count".to_string(),
            serde_json::Value::from(conversation.turns.len()),
        );
        self.records.upsert(record.clone()).await?;
        info!(conversation = %conversation.id.short(), chars = summary.len(), "summary stored");

        // The summary is searchable only once its vector exists. Exhausting
        // the retries keeps the summary and logs the loss.
        let model = Arc::clone(&self.model);
        let texts = [summary.clone()];
        let embedded = self
            .retry
            .run("summary embedding", || {
                let model = Arc::clone(&model);
                let texts = texts.clone();
                async move { model.embed(&texts).await }
            })
            .await;
        match embedded {
            Ok(mut vectors) if !vectors.is_empty() => {
                record.embedding = Some(vectors.remove(0));
                self.records.upsert(record).await?;
            }
            Ok(_) => {
                warn!(conversation = %conversation.id.short(), "embedding response was empty, summary stored without vector");
            }
            Err(err) => {
                warn!(
                    conversation = %conversation.id.short(),
                    %err,
                    "embedding failed after retries, summary stored without vector"
                );
            }
        }

        // Profile extraction is best-effort: a failure here preserves the
        // prior profile and never unwinds the stored summary.
        if let Err(err) = self.update_profile(actor, &summary).await {
            warn!(actor = %actor.id, %err, "profile update failed, keeping prior profile");
        }

        Ok(())
    }

    async fn summarize(&self, conversation: &Conversation) -> Result<String> {
        let transcript = conversation.transcript();
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SUMMARIZER_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Create a detailed summary that preserves ALL specific factual details \
                 (names, numbers, dates, technical specs, exact values, and any other \
                 important information) from this conversation. Preserve precision - \
                 do not generalize:\n\n{transcript}"
            )),
        ])
        .with_temperature(0.3);

        let response = self.model.complete(request).await?;
        Ok(response.content)
    }

    async fn update_profile(&self, actor: &Actor, summary: &str) -> Result<()> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(EXTRACTOR_SYSTEM_PROMPT),
            ChatMessage::user(extraction_prompt(summary)),
        ])
        .with_temperature(0.3);
        let response = self.model.complete(request).await?;

        let delta: ProfileDelta = serde_json::from_str(response.content.trim())?;
        if delta.is_empty() {
            debug!(actor = %actor.id, "no new profile information extracted");
            return Ok(());
        }

        let mut profile = self
            .profiles
            .get(&actor.id)
            .await?
            .unwrap_or_else(|| ProfileFacts::new(actor.id.clone()));
        info!(
            actor = %actor.id,
            facts = delta.new_facts.len(),
            preferences = delta.new_preferences.len(),
            topics = delta.new_topics.len(),
            "profile updated"
        );
        profile.apply(delta);
        self.profiles.put(profile).await?;
        Ok(())
    }
}

fn extraction_prompt(summary: &str) -> String {
    format!(
        "Extract and update user information from this conversation summary.\n\
         The conversation may contain ANY type of document or information (resume, proposal, technical document, business plan, research paper, contract, etc.).\n\
         \n\
         PRESERVE ALL SPECIFIC DETAILS regardless of document type:\n\
         - Exact names (people, organizations, places, products, entities) - use EXACT names\n\
         - Precise numbers (scores, percentages, amounts, measurements, dates, years) - use EXACT values\n\
         - Specific qualifications, credentials, certifications, degrees - COMPLETE details\n\
         - Technical specifications, requirements, conditions, terms - EXACT wording where important\n\
         - Projects, work items, tasks, deliverables, milestones - SPECIFIC information\n\
         - Key facts, claims, statements, findings - PRESERVE precision\n\
         \n\
         {summary}\n\
         \n\
         Return a JSON object with:\n\
         {{\n\
             \"new_facts\": [\"...\"],\n\
             \"new_preferences\": {{\"key\": \"value\"}},\n\
             \"new_topics\": [\"topic1\", \"topic2\"]\n\
         }}\n\
         \n\
         IMPORTANT:\n\
         - Use EXACT values, names, and specific details. Do NOT generalize.\n\
         - Work with ANY document type - extract relevant facts appropriately.\n\
         - Only include NEW information that should be added to the profile.\n\
         - If there's no new information, return empty arrays/objects."
    )
}
