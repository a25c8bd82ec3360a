//! # Mnemo Engine
//!
//! The role-scoped memory engine: semantic retrieval over summarized
//! conversations, deterministic context assembly, and the conversation
//! lifecycle that summarizes each chat exactly once when the next one opens.
//!
//! [`MemoryService`] is the single entry point a routing layer consumes.

pub mod context;
pub mod lifecycle;
pub mod retrieval;
pub mod service;

pub use context::ContextAssembler;
pub use lifecycle::ChatLifecycleCoordinator;
pub use retrieval::{RankedRecord, RetrievalEngine};
pub use service::{MemoryService, Stores, TurnOutcome, UploadOutcome};
