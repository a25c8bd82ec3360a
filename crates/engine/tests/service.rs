//! End-to-end tests for the memory service, running against the in-memory
//! stores with a scripted model client.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mnemo_chunker::PlainTextParser;
use mnemo_config::AppConfig;
use mnemo_core::{
    Actor, ActorId, ActorStore, CompletionRequest, CompletionResponse, Conversation,
    ConversationId, Error, MemoryRecord, ModelClient, OrgId, ProfileStore, RecordStore, Result,
    RetryPolicy, Role, ScopeError, SharingScope, TeamId, Turn, UpstreamError, Usage,
};
use mnemo_engine::{
    ChatLifecycleCoordinator, ContextAssembler, MemoryService, RetrievalEngine, Stores,
};
use mnemo_store::{
    InMemoryActorStore, InMemoryConversationStore, InMemoryDocumentStore, InMemoryProfileStore,
    InMemoryRecordStore,
};

/// Scripted model client. Embeddings come from a text-to-vector table
/// (defaulting to the unit x-axis vector), completions are routed on the
/// leading system prompt.
struct MockModel {
    vectors: HashMap<String, Vec<f32>>,
    summary: String,
    delta_json: String,
    embed_failures: AtomicU32,
    summarize_calls: AtomicU32,
}

impl MockModel {
    fn new() -> Self {
        Self {
            vectors: HashMap::new(),
            summary: "Summary of the conversation.".to_string(),
            delta_json: "{}".to_string(),
            embed_failures: AtomicU32::new(0),
            summarize_calls: AtomicU32::new(0),
        }
    }

    fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    fn with_delta(mut self, json: &str) -> Self {
        self.delta_json = json.to_string();
        self
    }

    fn failing_embeds(self, count: u32) -> Self {
        self.embed_failures.store(count, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let system = request
            .messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let content = if system.contains("fact-preserving summarizer") {
            self.summarize_calls.fetch_add(1, Ordering::SeqCst);
            self.summary.clone()
        } else if system.contains("extract structured information") {
            self.delta_json.clone()
        } else {
            "Understood.".to_string()
        };
        Ok(CompletionResponse {
            content,
            usage: Usage::default(),
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.embed_failures.load(Ordering::SeqCst) > 0 {
            self.embed_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(UpstreamError::Network("connection reset".to_string()).into());
        }
        Ok(texts
            .iter()
            .map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| vec![1.0, 0.0]))
            .collect())
    }
}

/// Unit vector whose cosine similarity to `[1, 0]` is exactly `s`.
fn unit(s: f32) -> Vec<f32> {
    vec![s, (1.0 - s * s).sqrt()]
}

fn stores() -> Stores {
    Stores {
        actors: Arc::new(InMemoryActorStore::new()),
        conversations: Arc::new(InMemoryConversationStore::new()),
        records: Arc::new(InMemoryRecordStore::new()),
        documents: Arc::new(InMemoryDocumentStore::new()),
        profiles: Arc::new(InMemoryProfileStore::new()),
    }
}

fn member(id: &str, org: &str) -> Actor {
    Actor::new(
        ActorId::new(id),
        Role::Member,
        Some(OrgId::new(org)),
        Some(TeamId::new("platform")),
    )
}

fn team_lead(id: &str, org: &str, team: &str) -> Actor {
    Actor::new(
        ActorId::new(id),
        Role::TeamLead,
        Some(OrgId::new(org)),
        Some(TeamId::new(team)),
    )
}

fn finalized_record(actor: &Actor, sharing: SharingScope, vector: Vec<f32>) -> MemoryRecord {
    let mut record = MemoryRecord::placeholder(ConversationId::new(), actor, sharing);
    record.summary = format!("Chat by {}", actor.id);
    record.embedding = Some(vector);
    record
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.retry.delay_ms = 1;
    config
}

fn service(model: Arc<MockModel>, stores: Stores, config: &AppConfig) -> MemoryService {
    MemoryService::new(model, Arc::new(PlainTextParser), stores, config)
}

#[tokio::test]
async fn member_retrieval_excludes_other_actors_records() {
    let stores = stores();
    let alice = member("alice", "acme");
    let bob = member("bob", "acme");
    let eve = member("eve", "globex");

    stores
        .records
        .upsert(finalized_record(&alice, SharingScope::Private, unit(0.9)))
        .await
        .unwrap();
    // Organization-shared, but members only ever see their own records.
    stores
        .records
        .upsert(finalized_record(&bob, SharingScope::Organization, unit(0.8)))
        .await
        .unwrap();
    stores
        .records
        .upsert(finalized_record(&eve, SharingScope::Organization, unit(0.7)))
        .await
        .unwrap();

    let model: Arc<dyn ModelClient> = Arc::new(MockModel::new());
    let engine = RetrievalEngine::new(model, stores.records, 5, 0.3);

    let results = engine.retrieve("query", &alice, None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].record.owner, ActorId::new("alice"));
}

#[tokio::test]
async fn team_lead_sees_team_and_org_shared_records() {
    let stores = stores();
    let lead = team_lead("lead", "acme", "platform");
    let teammate = member("teammate", "acme");
    let mut other_team = member("other", "acme");
    other_team.team = Some(TeamId::new("sales"));
    let mut outsider = member("outsider", "globex");
    outsider.team = Some(TeamId::new("sales"));

    stores
        .records
        .upsert(finalized_record(&lead, SharingScope::Private, unit(0.9)))
        .await
        .unwrap();
    // Same team: visible even when private.
    stores
        .records
        .upsert(finalized_record(&teammate, SharingScope::Private, unit(0.8)))
        .await
        .unwrap();
    // Other team in the same org: visible only because it is org-shared.
    stores
        .records
        .upsert(finalized_record(&other_team, SharingScope::Organization, unit(0.7)))
        .await
        .unwrap();
    let mut private_other_team = finalized_record(&other_team, SharingScope::Private, unit(0.6));
    private_other_team.conversation = ConversationId::new();
    stores.records.upsert(private_other_team).await.unwrap();
    stores
        .records
        .upsert(finalized_record(&outsider, SharingScope::Organization, unit(0.5)))
        .await
        .unwrap();

    let model: Arc<dyn ModelClient> = Arc::new(MockModel::new());
    let engine = RetrievalEngine::new(model, stores.records, 10, 0.3);

    let results = engine.retrieve("query", &lead, None).await.unwrap();
    let owners: Vec<String> = results.iter().map(|r| r.record.owner.to_string()).collect();
    assert_eq!(owners, vec!["lead", "teammate", "other"]);
}

#[tokio::test]
async fn soft_threshold_annotates_but_never_drops() {
    let stores = stores();
    let alice = member("alice", "acme");

    for similarity in [0.9, 0.4, 0.8, 0.2, 0.6] {
        let mut record = finalized_record(&alice, SharingScope::Private, unit(similarity));
        record.conversation = ConversationId::new();
        stores.records.upsert(record).await.unwrap();
    }

    let model: Arc<dyn ModelClient> = Arc::new(MockModel::new());
    let engine = RetrievalEngine::new(model, stores.records, 3, 0.7);

    let results = engine.retrieve("query", &alice, None).await.unwrap();
    let similarities: Vec<f32> = results.iter().map(|r| r.similarity).collect();
    assert_eq!(results.len(), 3);
    assert!(similarities[0] > 0.89 && similarities[0] < 0.91);
    assert!(similarities[1] > 0.79 && similarities[1] < 0.81);
    // Below the threshold, still returned, only annotated.
    assert!(similarities[2] > 0.59 && similarities[2] < 0.61);
    assert!(results[0].above_threshold);
    assert!(results[1].above_threshold);
    assert!(!results[2].above_threshold);
}

#[tokio::test]
async fn retrieval_excludes_the_current_conversation() {
    let stores = stores();
    let alice = member("alice", "acme");

    let current = finalized_record(&alice, SharingScope::Private, unit(0.95));
    let current_id = current.conversation.clone();
    stores.records.upsert(current).await.unwrap();
    stores
        .records
        .upsert(finalized_record(&alice, SharingScope::Private, unit(0.5)))
        .await
        .unwrap();

    let model: Arc<dyn ModelClient> = Arc::new(MockModel::new());
    let engine = RetrievalEngine::new(model, stores.records, 5, 0.3);

    let results = engine
        .retrieve("query", &alice, Some(&current_id))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_ne!(results[0].record.conversation, current_id);
}

#[tokio::test]
async fn closing_twice_stores_exactly_one_summary() {
    let stores = stores();
    let alice = member("alice", "acme");
    let mock = Arc::new(MockModel::new());
    let model: Arc<dyn ModelClient> = mock.clone();

    let lifecycle = ChatLifecycleCoordinator::new(
        model,
        Arc::clone(&stores.records),
        Arc::clone(&stores.profiles),
        RetryPolicy::new(3, Duration::from_millis(1)),
    );

    let mut conversation = Conversation::new(
        ConversationId::new(),
        alice.id.clone(),
        alice.organization.clone(),
        alice.team.clone(),
    );
    let mut turn = Turn::pending("What is the capital of France?", None);
    turn.assistant_text = "Paris.".to_string();
    conversation.turns.push(turn);

    lifecycle.finalize(&alice, &conversation).await.unwrap();
    lifecycle.finalize(&alice, &conversation).await.unwrap();

    assert_eq!(mock.summarize_calls.load(Ordering::SeqCst), 1);
    let record = stores
        .records
        .get_by_conversation(&conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert!(record.has_summary());
    assert_eq!(record.summary, "Summary of the conversation.");
}

#[tokio::test]
async fn embedding_exhaustion_keeps_summary_without_vector() {
    let stores = stores();
    let alice = member("alice", "acme");
    let mock = Arc::new(MockModel::new().failing_embeds(3));
    let model: Arc<dyn ModelClient> = mock.clone();

    let lifecycle = ChatLifecycleCoordinator::new(
        model,
        Arc::clone(&stores.records),
        Arc::clone(&stores.profiles),
        RetryPolicy::new(3, Duration::from_millis(1)),
    );

    let mut conversation = Conversation::new(
        ConversationId::new(),
        alice.id.clone(),
        alice.organization.clone(),
        alice.team.clone(),
    );
    let mut turn = Turn::pending("hello", None);
    turn.assistant_text = "hi".to_string();
    conversation.turns.push(turn);

    // All three embedding attempts fail; the close still succeeds.
    lifecycle.finalize(&alice, &conversation).await.unwrap();

    let record = stores
        .records
        .get_by_conversation(&conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.summary, "Summary of the conversation.");
    assert!(record.embedding.is_none());
    assert!(!record.has_summary());
}

#[tokio::test]
async fn new_conversation_finalizes_the_previous_one() {
    let stores = stores();
    let alice = member("alice", "acme");
    let config = test_config();
    let service = service(Arc::new(MockModel::new()), stores.clone(), &config);

    let first = service
        .handle_turn(&alice, None, "Tell me about Rust.", None)
        .await
        .unwrap();
    assert_eq!(first.assistant_text, "Understood.");

    let second = service
        .handle_turn(&alice, None, "New topic.", None)
        .await
        .unwrap();
    assert_ne!(second.conversation_id, first.conversation_id);

    let record = stores
        .records
        .get_by_conversation(&first.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert!(record.has_summary());

    // The new conversation gets a private placeholder immediately.
    let placeholder = stores
        .records
        .get_by_conversation(&second.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert!(placeholder.summary.is_empty());
    assert_eq!(placeholder.sharing, SharingScope::Private);
}

#[tokio::test]
async fn profile_merged_from_extracted_delta() {
    let stores = stores();
    let alice = member("alice", "acme");
    let config = test_config();
    let mock = Arc::new(MockModel::new().with_delta(
        r#"{"new_facts": ["Works at Acme", "CGPA 8.5"], "new_topics": ["rust"]}"#,
    ));
    let service = service(mock, stores.clone(), &config);

    service
        .handle_turn(&alice, None, "My CGPA is 8.5.", None)
        .await
        .unwrap();
    service
        .handle_turn(&alice, None, "Something else.", None)
        .await
        .unwrap();

    let profile = stores.profiles.get(&alice.id).await.unwrap().unwrap();
    assert_eq!(profile.facts, vec!["Works at Acme", "CGPA 8.5"]);
    assert_eq!(profile.topics, vec!["rust"]);
}

#[tokio::test]
async fn orphan_upload_is_claimed_exactly_once() {
    let stores = stores();
    let alice = member("alice", "acme");
    let config = test_config();
    let service = service(Arc::new(MockModel::new()), stores.clone(), &config);

    let upload = service
        .handle_attachment_upload(&alice, b"Quarterly revenue was $4.2M.", "report.txt")
        .await
        .unwrap();
    assert_eq!(upload.chunk_count, 1);

    let first = service
        .handle_turn(&alice, None, "summarize it", None)
        .await
        .unwrap();
    assert_eq!(first.attachment_used, Some(upload.document_id.clone()));

    let second = service
        .handle_turn(&alice, Some(&first.conversation_id), "thanks", None)
        .await
        .unwrap();
    assert_eq!(second.attachment_used, None);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let stores = stores();
    let alice = member("alice", "acme");
    let mut config = test_config();
    config.upload.max_bytes = 16;
    let service = service(Arc::new(MockModel::new()), stores, &config);

    let err = service
        .handle_attachment_upload(&alice, b"this upload is far too large", "big.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn sharing_scope_change_is_owner_only() {
    let stores = stores();
    let alice = member("alice", "acme");
    let bob = member("bob", "acme");
    let config = test_config();
    let service = service(Arc::new(MockModel::new()), stores.clone(), &config);

    let outcome = service
        .handle_turn(&alice, None, "hello", None)
        .await
        .unwrap();

    let err = service
        .set_sharing_scope(&bob, &outcome.conversation_id, SharingScope::Organization)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Scope(ScopeError::Denied { .. })));

    service
        .set_sharing_scope(&alice, &outcome.conversation_id, SharingScope::Organization)
        .await
        .unwrap();
    let record = stores
        .records
        .get_by_conversation(&outcome.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.sharing, SharingScope::Organization);
    assert!(record.shared_at.is_some());
}

#[tokio::test]
async fn second_super_admin_is_downgraded_to_member() {
    let stores = stores();
    let root = Actor::new(ActorId::new("root"), Role::SuperAdmin, None, None);
    let impostor = Actor::new(ActorId::new("impostor"), Role::SuperAdmin, None, None);
    let config = test_config();
    let service = service(Arc::new(MockModel::new()), stores.clone(), &config);

    service.handle_turn(&root, None, "hello", None).await.unwrap();
    service
        .handle_turn(&impostor, None, "hello", None)
        .await
        .unwrap();

    let root = stores.actors.get(&ActorId::new("root")).await.unwrap().unwrap();
    let impostor = stores
        .actors
        .get(&ActorId::new("impostor"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(root.role, Role::SuperAdmin);
    assert_eq!(impostor.role, Role::Member);

    // Re-registering the holder keeps the role.
    service.handle_turn(&root, None, "again", None).await.unwrap();
    let root = stores.actors.get(&ActorId::new("root")).await.unwrap().unwrap();
    assert_eq!(root.role, Role::SuperAdmin);
}

#[tokio::test]
async fn conversation_documents_respect_access_rules() {
    let stores = stores();
    let alice = member("alice", "acme");
    let bob = member("bob", "acme");
    let carol = member("carol", "globex");
    let config = test_config();
    let service = service(Arc::new(MockModel::new()), stores.clone(), &config);

    service
        .handle_attachment_upload(&alice, b"Design notes for the widget.", "notes.txt")
        .await
        .unwrap();
    let outcome = service
        .handle_turn(&alice, None, "read the notes", None)
        .await
        .unwrap();
    service
        .set_sharing_scope(&alice, &outcome.conversation_id, SharingScope::Organization)
        .await
        .unwrap();

    // Same organization, shared record: documents are reachable.
    let documents = service
        .conversation_documents(&bob, &outcome.conversation_id)
        .await
        .unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].0.metadata.filename, "notes.txt");

    // Different organization: denied outright.
    let err = service
        .conversation_documents(&carol, &outcome.conversation_id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Scope(ScopeError::Denied { .. })));
}

#[tokio::test]
async fn assembled_context_orders_sections() {
    let stores = stores();
    let alice = member("alice", "acme");

    let mut profile = mnemo_core::ProfileFacts::new(alice.id.clone());
    profile.apply(mnemo_core::ProfileDelta {
        new_facts: vec!["Lives in Berlin".to_string()],
        ..Default::default()
    });
    stores.profiles.put(profile).await.unwrap();
    stores
        .records
        .upsert(finalized_record(&alice, SharingScope::Private, unit(0.9)))
        .await
        .unwrap();

    let model: Arc<dyn ModelClient> = Arc::new(MockModel::new());
    let retrieval = Arc::new(RetrievalEngine::new(
        Arc::clone(&model),
        Arc::clone(&stores.records),
        5,
        0.3,
    ));
    let assembler = ContextAssembler::new(
        Arc::clone(&stores.profiles),
        Arc::clone(&stores.conversations),
        Arc::clone(&stores.documents),
        retrieval,
        5,
        1000,
        10,
    );

    let mut conversation = Conversation::new(
        ConversationId::new(),
        alice.id.clone(),
        alice.organization.clone(),
        alice.team.clone(),
    );
    let mut done = Turn::pending("earlier question", None);
    done.assistant_text = "earlier answer".to_string();
    conversation.turns.push(done);
    conversation.turns.push(Turn::pending("what do you know about me?", None));

    let messages = assembler
        .assemble(&alice, &conversation, "what do you know about me?")
        .await
        .unwrap();

    assert!(messages[0].content.contains("facts about the user"));
    assert!(messages[0].content.contains("Lives in Berlin"));
    assert!(messages[1].content.contains("--- Chat 1"));
    assert!(messages[1].content.contains("Chat by alice"));
    // Recent window precedes the pending message, which is always last.
    assert_eq!(messages[messages.len() - 3].content, "earlier question");
    assert_eq!(messages[messages.len() - 2].content, "earlier answer");
    assert_eq!(messages.last().unwrap().content, "what do you know about me?");
}

#[tokio::test]
async fn attached_document_selects_document_priority_framing() {
    let stores = stores();
    let alice = member("alice", "acme");
    let config = test_config();
    let model = Arc::new(MockModel::new());
    let service = service(Arc::clone(&model), stores.clone(), &config);

    stores
        .records
        .upsert(finalized_record(&alice, SharingScope::Private, unit(0.9)))
        .await
        .unwrap();
    let upload = service
        .handle_attachment_upload(&alice, b"Quarterly revenue grew twelve percent.", "report.txt")
        .await
        .unwrap();

    let model: Arc<dyn ModelClient> = model;
    let retrieval = Arc::new(RetrievalEngine::new(
        Arc::clone(&model),
        Arc::clone(&stores.records),
        5,
        0.3,
    ));
    let assembler = ContextAssembler::new(
        Arc::clone(&stores.profiles),
        Arc::clone(&stores.conversations),
        Arc::clone(&stores.documents),
        retrieval,
        5,
        1000,
        10,
    );

    let mut conversation = Conversation::new(
        ConversationId::new(),
        alice.id.clone(),
        alice.organization.clone(),
        alice.team.clone(),
    );
    conversation
        .turns
        .push(Turn::pending("summarize it", Some(upload.document_id)));

    let messages = assembler
        .assemble(&alice, &conversation, "summarize it")
        .await
        .unwrap();

    // Attached document message first, then the document-priority framing
    // for the retrieved history.
    assert!(messages[0]
        .content
        .starts_with("CRITICAL: A document has been uploaded"));
    assert!(messages[0].content.contains("[Document: report.txt]"));
    assert!(messages[1]
        .content
        .contains("MEMORY CONTEXT - DOCUMENT WITH HISTORICAL CONTEXT"));
    assert!(messages[1].content.contains("Chat by alice"));
}

#[tokio::test]
async fn chat_query_selects_chat_listing_framing() {
    let stores = stores();
    let alice = member("alice", "acme");
    stores
        .records
        .upsert(finalized_record(&alice, SharingScope::Private, unit(0.9)))
        .await
        .unwrap();

    let model: Arc<dyn ModelClient> = Arc::new(MockModel::new());
    let retrieval = Arc::new(RetrievalEngine::new(
        Arc::clone(&model),
        Arc::clone(&stores.records),
        5,
        0.3,
    ));
    let assembler = ContextAssembler::new(
        Arc::clone(&stores.profiles),
        Arc::clone(&stores.conversations),
        Arc::clone(&stores.documents),
        retrieval,
        5,
        1000,
        10,
    );

    let mut conversation = Conversation::new(
        ConversationId::new(),
        alice.id.clone(),
        alice.organization.clone(),
        alice.team.clone(),
    );
    conversation
        .turns
        .push(Turn::pending("what conversations have we had?", None));

    let messages = assembler
        .assemble(&alice, &conversation, "what conversations have we had?")
        .await
        .unwrap();

    let framing = &messages[0].content;
    assert!(framing.starts_with("MEMORY CONTEXT - CHAT/CONVERSATION QUERY\n"));
    assert!(!framing.contains("WITH DOCUMENTS"));
    assert!(framing.contains("(from your chats and organization shared chats)"));
}
