//! Actors and the organization/team hierarchy they belong to.
//!
//! Every record in the system is tagged with the owning actor plus optional
//! organization and team identifiers. Roles decide how far an actor can see
//! into other actors' memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an actor (end user of the assistant).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Organization identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub String);

impl OrgId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Team identifier, scoped within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Visibility role of an actor.
///
/// At most one `SuperAdmin` may exist system-wide; stores enforce the
/// constraint by downgrading later assignment attempts to `Member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees every record across all organizations.
    SuperAdmin,
    /// Sees own records, the whole team's records, and organization-shared
    /// records from other teams in the same organization.
    TeamLead,
    /// Sees only own records within the own organization.
    #[default]
    Member,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::SuperAdmin => "super_admin",
            Role::TeamLead => "team_lead",
            Role::Member => "member",
        };
        write!(f, "{s}")
    }
}

/// An actor with its hierarchy bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,

    #[serde(default)]
    pub role: Role,

    /// Organization binding. Unbound actors get empty retrieval results
    /// rather than errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrgId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamId>,

    pub created_at: DateTime<Utc>,
}

impl Actor {
    pub fn new(
        id: ActorId,
        role: Role,
        organization: Option<OrgId>,
        team: Option<TeamId>,
    ) -> Self {
        Self {
            id,
            role,
            organization,
            team,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serde_snake_case() {
        let json = serde_json::to_string(&Role::SuperAdmin).unwrap();
        assert_eq!(json, "\"super_admin\"");
        let parsed: Role = serde_json::from_str("\"team_lead\"").unwrap();
        assert_eq!(parsed, Role::TeamLead);
    }

    #[test]
    fn default_role_is_member() {
        assert_eq!(Role::default(), Role::Member);
    }

    #[test]
    fn actor_roundtrip() {
        let actor = Actor::new(
            ActorId::new("alice"),
            Role::TeamLead,
            Some(OrgId::new("acme")),
            Some(TeamId::new("platform")),
        );
        let json = serde_json::to_string(&actor).unwrap();
        let parsed: Actor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, actor.id);
        assert_eq!(parsed.role, Role::TeamLead);
        assert_eq!(parsed.team, Some(TeamId::new("platform")));
    }
}
