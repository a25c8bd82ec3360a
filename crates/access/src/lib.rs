//! Role-scoped visibility rules.
//!
//! A [`ScopeFilter`] is built once per request from the acting user and then
//! applied as a pure predicate over memory records, so the same policy works
//! against any index backend. Building the filter is where role
//! prerequisites are enforced; an actor without the bindings their role
//! needs cannot be given that role's visibility, so construction fails
//! rather than silently widening or narrowing the scope.
//!
//! Retrieval treats a failed construction as "nothing visible" and returns
//! empty results. Direct access checks surface the error instead.
//!
//! Every non-super-admin branch re-checks organization equality on its own,
//! even where another condition already implies it. Cross-organization
//! leakage has to be structurally impossible, not merely implied.

use tracing::debug;

use mnemo_core::{Actor, ActorId, MemoryRecord, OrgId, Role, ScopeError, SharingScope, TeamId};

/// Visibility predicate derived from an actor's role and bindings.
#[derive(Debug, Clone)]
pub enum ScopeFilter {
    /// Super admins see every record, across organizations.
    All,
    /// Team leads see their own records, their team's records, and
    /// organization-shared records from other teams, all within their org.
    TeamLead {
        actor: ActorId,
        organization: OrgId,
        team: TeamId,
    },
    /// Members see only their own records within their organization.
    /// Organization-wide browsing is reserved for team leads and above.
    Member {
        actor: ActorId,
        organization: OrgId,
    },
}

impl ScopeFilter {
    /// Build the filter for `actor`, validating role prerequisites.
    pub fn for_actor(actor: &Actor) -> Result<Self, ScopeError> {
        match actor.role {
            Role::SuperAdmin => Ok(ScopeFilter::All),
            Role::TeamLead => {
                let organization = actor
                    .organization
                    .clone()
                    .ok_or_else(|| ScopeError::MissingOrganization(actor.id.to_string()))?;
                let team = actor
                    .team
                    .clone()
                    .ok_or_else(|| ScopeError::MissingTeam(actor.id.to_string()))?;
                Ok(ScopeFilter::TeamLead {
                    actor: actor.id.clone(),
                    organization,
                    team,
                })
            }
            Role::Member => {
                let organization = actor
                    .organization
                    .clone()
                    .ok_or_else(|| ScopeError::MissingOrganization(actor.id.to_string()))?;
                Ok(ScopeFilter::Member {
                    actor: actor.id.clone(),
                    organization,
                })
            }
        }
    }

    /// Whether `record` is visible under this scope.
    pub fn permits(&self, record: &MemoryRecord) -> bool {
        match self {
            ScopeFilter::All => true,
            ScopeFilter::TeamLead {
                actor,
                organization,
                team,
            } => {
                let same_org = record.organization.as_ref() == Some(organization);
                if !same_org {
                    return false;
                }
                if record.owner == *actor {
                    return true;
                }
                if record.team.as_ref() == Some(team) {
                    return true;
                }
                // Org-shared records from other teams; records with no team
                // tag fail the inequality and stay hidden here.
                record.sharing == SharingScope::Organization
                    && matches!(&record.team, Some(t) if t != team)
            }
            ScopeFilter::Member {
                actor,
                organization,
            } => record.owner == *actor && record.organization.as_ref() == Some(organization),
        }
    }

    /// Human-readable description of the scope, used when framing retrieved
    /// context for the model.
    pub fn describe(&self) -> &'static str {
        match self {
            ScopeFilter::All => "from all organizations",
            ScopeFilter::TeamLead { .. } => "from your team and organization shared chats",
            ScopeFilter::Member { .. } => "from your chats and organization shared chats",
        }
    }
}

/// Check whether `actor` may read the conversation behind `record`.
///
/// Owners and super admins always may. Anyone in the same organization may
/// when the record is organization-shared. A team lead additionally may
/// when both sides carry matching organization and team tags. This backs
/// direct per-resource reads such as listing a conversation's documents;
/// unlike retrieval it raises on denial.
pub fn can_access_conversation(actor: &Actor, record: &MemoryRecord) -> Result<(), ScopeError> {
    if actor.role == Role::SuperAdmin || record.owner == actor.id {
        return Ok(());
    }

    let same_org = match (&actor.organization, &record.organization) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };

    if same_org && record.sharing == SharingScope::Organization {
        return Ok(());
    }

    if actor.role == Role::TeamLead && same_org {
        let same_team = match (&actor.team, &record.team) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        if same_team {
            return Ok(());
        }
    }

    debug!(actor = %actor.id, conversation = %record.conversation, "conversation access denied");
    Err(ScopeError::Denied {
        actor: actor.id.to_string(),
        resource: format!("conversation {}", record.conversation),
    })
}
