//! Conversation and turn domain types.
//!
//! A conversation is an ordered sequence of turns. Each turn pairs a user
//! message with the assistant reply; the reply stays empty while the turn
//! is pending, and only completed turns participate in the recent-history
//! window or in summarization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::{ActorId, OrgId, TeamId};
use crate::document::DocumentId;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    /// Short prefix for log lines and rendered context sections. Cut on a
    /// char boundary so non-ASCII ids stay sliceable.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user/assistant exchange within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID.
    pub id: String,

    /// The user's message text.
    pub user_text: String,

    /// The assistant reply. Empty while the turn is pending.
    #[serde(default)]
    pub assistant_text: String,

    /// Document attached to this turn, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<DocumentId>,

    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a pending turn: user text recorded, assistant reply outstanding.
    pub fn pending(user_text: impl Into<String>, attachment: Option<DocumentId>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_text: user_text.into(),
            assistant_text: String::new(),
            attachment,
            created_at: Utc::now(),
        }
    }

    /// A turn is complete once the assistant reply is non-blank.
    pub fn is_complete(&self) -> bool {
        !self.assistant_text.trim().is_empty()
    }
}

/// A conversation with its hierarchy tags and ordered turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,

    pub owner: ActorId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrgId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamId>,

    /// Turns in insertion order (oldest first).
    pub turns: Vec<Turn>,

    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        id: ConversationId,
        owner: ActorId,
        organization: Option<OrgId>,
        team: Option<TeamId>,
    ) -> Self {
        Self {
            id,
            owner,
            organization,
            team,
            turns: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Completed turns only, oldest first.
    pub fn completed_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.is_complete())
    }

    /// Document IDs attached to any turn in this conversation, deduplicated.
    pub fn attachment_ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = Vec::new();
        for turn in &self.turns {
            if let Some(doc) = &turn.attachment {
                if !ids.contains(doc) {
                    ids.push(doc.clone());
                }
            }
        }
        ids
    }

    /// Render the full turn history as plain text for summarization.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("User: {}\nAssistant: {}", t.user_text, t.assistant_text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
