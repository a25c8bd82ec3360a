//! # Mnemo Core
//!
//! Domain types, traits, and error definitions for the Mnemo long-term
//! memory engine. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod actor;
pub mod conversation;
pub mod document;
pub mod error;
pub mod model;
pub mod profile;
pub mod record;
pub mod retry;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use actor::{Actor, ActorId, OrgId, Role, TeamId};
pub use conversation::{Conversation, ConversationId, Turn};
pub use document::{Chunk, ChunkRecord, Document, DocumentId, DocumentMetadata};
pub use error::{Error, Result, ScopeError, StoreError, UpstreamError};
pub use model::{ChatMessage, ChatRole, CompletionRequest, CompletionResponse, ModelClient, Usage};
pub use profile::{ProfileDelta, ProfileFacts};
pub use record::{MemoryRecord, SharingScope};
pub use retry::RetryPolicy;
pub use store::{
    ActorStore, ConversationStore, DocumentStore, ProfileStore, RecordStore, ScoredRecord,
};
