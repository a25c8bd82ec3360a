//! Role-scoped semantic retrieval over memory records.

use std::sync::Arc;

use mnemo_access::ScopeFilter;
use mnemo_core::{Actor, ConversationId, MemoryRecord, ModelClient, RecordStore, Result};
use tracing::{debug, info};

/// A retrieved record annotated with its similarity and threshold standing.
#[derive(Debug, Clone)]
pub struct RankedRecord {
    pub record: MemoryRecord,
    /// Cosine similarity clamped to `[0, 1]`.
    pub similarity: f32,
    /// Whether the similarity cleared the soft threshold. Informational
    /// only; records below the threshold are still returned.
    pub above_threshold: bool,
}

/// Embeds queries and ranks visible records by cosine similarity.
pub struct RetrievalEngine {
    model: Arc<dyn ModelClient>,
    records: Arc<dyn RecordStore>,

    /// Number of records returned per query.
    top_k: usize,

    /// Soft relevance cut-off. Results falling short are annotated, never
    /// dropped: the best available K beats returning nothing.
    similarity_threshold: f32,
}

impl RetrievalEngine {
    pub fn new(
        model: Arc<dyn ModelClient>,
        records: Arc<dyn RecordStore>,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Self {
        Self {
            model,
            records,
            top_k,
            similarity_threshold,
        }
    }

    /// Retrieve the most relevant visible records for `query_text`.
    ///
    /// Visibility is decided by the actor's scope filter before ranking, so
    /// hidden records never displace visible ones. An actor whose role
    /// bindings are incomplete gets an empty result, not an error.
    pub async fn retrieve(
        &self,
        query_text: &str,
        actor: &Actor,
        exclude: Option<&ConversationId>,
    ) -> Result<Vec<RankedRecord>> {
        let filter = match ScopeFilter::for_actor(actor) {
            Ok(filter) => filter,
            Err(err) => {
                debug!(actor = %actor.id, %err, "scope filter unavailable, returning no records");
                return Ok(Vec::new());
            }
        };

        let vectors = self.model.embed(&[query_text.to_string()]).await?;
        let Some(query_vector) = vectors.into_iter().next() else {
            return Ok(Vec::new());
        };

        let visible = |record: &MemoryRecord| {
            filter.permits(record) && exclude.is_none_or(|c| &record.conversation != c)
        };
        let scored = self
            .records
            .vector_query(&query_vector, self.top_k, &visible)
            .await?;

        let ranked: Vec<RankedRecord> = scored
            .into_iter()
            .map(|s| RankedRecord {
                above_threshold: s.similarity >= self.similarity_threshold,
                similarity: s.similarity,
                record: s.record,
            })
            .collect();

        info!(
            actor = %actor.id,
            role = ?actor.role,
            results = ranked.len(),
            above_threshold = ranked.iter().filter(|r| r.above_threshold).count(),
            "retrieval complete"
        );
        Ok(ranked)
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}
