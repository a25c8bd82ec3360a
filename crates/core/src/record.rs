//! Memory records — the durable per-conversation summary plus its vector.
//!
//! Exactly one record exists per conversation. A record starts life as a
//! placeholder (empty summary, no embedding) created when the conversation
//! opens, so the sharing scope can be set before any turn completes. The
//! summary and embedding are filled in when the conversation is finalized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::{Actor, ActorId, OrgId, TeamId};
use crate::conversation::ConversationId;

/// How widely a conversation's memory is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingScope {
    /// Visible to the owner (and super admin / the owner's team lead).
    #[default]
    Private,
    /// Additionally visible organization-wide under the role rules.
    Organization,
}

impl std::fmt::Display for SharingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SharingScope::Private => "private",
            SharingScope::Organization => "organization",
        };
        write!(f, "{s}")
    }
}

/// The durable memory entry for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique record ID.
    pub record_id: String,

    /// The conversation this record summarizes. Unique per record.
    pub conversation: ConversationId,

    pub owner: ActorId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrgId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamId>,

    #[serde(default)]
    pub sharing: SharingScope,

    /// Fact-preserving summary. Empty string means placeholder.
    #[serde(default)]
    pub summary: String,

    /// Summary embedding. Absent until embedding succeeds; records without
    /// a vector never surface in retrieval.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,

    /// Set when sharing was widened to the organization; cleared on revoke.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    /// Create the placeholder record written at conversation-open time.
    pub fn placeholder(
        conversation: ConversationId,
        actor: &Actor,
        sharing: SharingScope,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            conversation,
            owner: actor.id.clone(),
            organization: actor.organization.clone(),
            team: actor.team.clone(),
            sharing,
            summary: String::new(),
            embedding: None,
            metadata: serde_json::Map::new(),
            created_at: Utc::now(),
            shared_at: match sharing {
                SharingScope::Organization => Some(Utc::now()),
                SharingScope::Private => None,
            },
        }
    }

    /// Finalization is complete once both summary text and vector exist.
    pub fn has_summary(&self) -> bool {
        !self.summary.is_empty() && self.embedding.is_some()
    }
}
