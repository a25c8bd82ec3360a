//! Per-actor profile facts accumulated across conversations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::ActorId;

/// Stable knowledge about an actor, updated merge-only.
///
/// Facts and topics are append-only lists (verbatim duplicates skipped);
/// preferences are keyed and overwrite on collision. The profile is never
/// replaced wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileFacts {
    pub owner: ActorId,
    #[serde(default)]
    pub facts: Vec<String>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileFacts {
    pub fn new(owner: ActorId) -> Self {
        Self {
            owner,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.preferences.is_empty() && self.topics.is_empty()
    }

    /// Merge newly extracted items in.
    pub fn apply(&mut self, delta: ProfileDelta) {
        for fact in delta.new_facts {
            let fact = fact.trim().to_string();
            if !fact.is_empty() && !self.facts.contains(&fact) {
                self.facts.push(fact);
            }
        }
        for (key, value) in delta.new_preferences {
            let key = key.trim().to_string();
            if !key.is_empty() {
                self.preferences.insert(key, value);
            }
        }
        for topic in delta.new_topics {
            let topic = topic.trim().to_string();
            if !topic.is_empty() && !self.topics.contains(&topic) {
                self.topics.push(topic);
            }
        }
        self.updated_at = Some(Utc::now());
    }
}

/// Items extracted from a single finalized conversation. Parsed from model
/// JSON output, so every field tolerates absence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileDelta {
    #[serde(default)]
    pub new_facts: Vec<String>,
    #[serde(default)]
    pub new_preferences: BTreeMap<String, String>,
    #[serde(default)]
    pub new_topics: Vec<String>,
}

impl ProfileDelta {
    pub fn is_empty(&self) -> bool {
        self.new_facts.is_empty() && self.new_preferences.is_empty() && self.new_topics.is_empty()
    }
}
