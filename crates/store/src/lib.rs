//! Storage backends for conversations, memory records, documents and
//! profiles, plus the vector similarity math retrieval is built on.

pub mod in_memory;
pub mod vector;

pub use in_memory::{
    InMemoryActorStore, InMemoryConversationStore, InMemoryDocumentStore, InMemoryProfileStore,
    InMemoryRecordStore,
};
pub use vector::{cosine_similarity, relevance};
