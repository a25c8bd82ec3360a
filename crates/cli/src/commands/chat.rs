//! `mnemo chat` — Interactive chat with role-scoped memory.

use std::io::{BufRead, Write};
use std::sync::Arc;

use mnemo_chunker::PlainTextParser;
use mnemo_config::AppConfig;
use mnemo_core::{Actor, ActorId, ConversationId, OrgId, Role, SharingScope, TeamId};
use mnemo_engine::{MemoryService, Stores};
use mnemo_providers::OpenAiClient;
use mnemo_store::{
    InMemoryActorStore, InMemoryConversationStore, InMemoryDocumentStore, InMemoryProfileStore,
    InMemoryRecordStore,
};

pub async fn run(
    user: String,
    organization: Option<String>,
    team: Option<String>,
    role: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.validate().map_err(|e| format!("Invalid config: {e}"))?;

    let Some(api_key) = config.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export MNEMO_API_KEY='sk-...'");
        eprintln!("    export OPENAI_API_KEY='sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let role = match role.as_str() {
        "super_admin" => Role::SuperAdmin,
        "team_lead" => Role::TeamLead,
        "member" => Role::Member,
        other => return Err(format!("Unknown role '{other}'").into()),
    };
    let actor = Actor::new(
        ActorId::new(user),
        role,
        organization.map(OrgId::new),
        team.map(TeamId::new),
    );

    let model = Arc::new(OpenAiClient::new(
        config.base_url.clone(),
        api_key,
        config.chat_model.clone(),
        config.embedding_model.clone(),
    ));
    let stores = Stores {
        actors: Arc::new(InMemoryActorStore::new()),
        conversations: Arc::new(InMemoryConversationStore::new()),
        records: Arc::new(InMemoryRecordStore::new()),
        documents: Arc::new(InMemoryDocumentStore::new()),
        profiles: Arc::new(InMemoryProfileStore::new()),
    };
    let service = MemoryService::new(model, Arc::new(PlainTextParser), stores, &config);

    println!();
    println!("  Mnemo — Interactive Chat");
    println!("  ------------------------");
    println!("  User:   {} ({:?})", actor.id, actor.role);
    println!("  Model:  {}", config.chat_model);
    println!();
    println!("  Commands:");
    println!("    /new                     start a new conversation (summarizes the current one)");
    println!("    /upload <path>           attach a text file to the next message");
    println!("    /share <private|organization>  change the current conversation's sharing scope");
    println!("    exit                     quit");
    println!();

    let stdin = std::io::stdin();
    let mut current: Option<ConversationId> = None;

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        if line == "/new" {
            current = None;
            println!("  Started a new conversation. The previous one will be summarized.");
            continue;
        }

        if let Some(path) = line.strip_prefix("/upload ") {
            let path = path.trim();
            match std::fs::read(path) {
                Ok(bytes) => {
                    let filename = std::path::Path::new(path)
                        .file_name()
                        .map(|f| f.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.to_string());
                    match service.handle_attachment_upload(&actor, &bytes, &filename).await {
                        Ok(outcome) => println!(
                            "  Uploaded {filename} ({} chunks). It will attach to your next message.",
                            outcome.chunk_count
                        ),
                        Err(e) => eprintln!("  Upload failed: {e}"),
                    }
                }
                Err(e) => eprintln!("  Could not read {path}: {e}"),
            }
            continue;
        }

        if let Some(scope) = line.strip_prefix("/share ") {
            let Some(conversation_id) = &current else {
                eprintln!("  No active conversation yet. Send a message first.");
                continue;
            };
            let scope = match scope.trim() {
                "private" => SharingScope::Private,
                "organization" => SharingScope::Organization,
                other => {
                    eprintln!("  Unknown scope '{other}'. Use private or organization.");
                    continue;
                }
            };
            match service.set_sharing_scope(&actor, conversation_id, scope).await {
                Ok(()) => println!("  Sharing scope set to {scope}."),
                Err(e) => eprintln!("  Could not change sharing scope: {e}"),
            }
            continue;
        }

        eprint!("  ...");
        match service.handle_turn(&actor, current.as_ref(), line, None).await {
            Ok(outcome) => {
                eprint!("\r     \r");
                if outcome.attachment_used.is_some() {
                    println!("  (attached your uploaded document)");
                }
                println!("  Mnemo > {}", outcome.assistant_text);
                println!();
                current = Some(outcome.conversation_id);
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  Error: {e}");
            }
        }
    }

    println!("  Bye.");
    Ok(())
}
