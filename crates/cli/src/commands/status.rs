//! `mnemo status` — Show the effective configuration.

use mnemo_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("Mnemo Status");
    println!("============");
    println!("  Config dir:       {}", AppConfig::config_dir().display());
    println!("  Base URL:         {}", config.base_url);
    println!("  Chat model:       {}", config.chat_model);
    println!("  Embedding model:  {}", config.embedding_model);
    println!("  Dimensions:       {}", config.embedding_dimensions);
    println!("  Top K:            {}", config.retrieval.top_k);
    println!("  Threshold:        {}", config.retrieval.similarity_threshold);
    println!("  Recent turns:     {}", config.context.recent_messages_limit);
    println!("  Chunk size:       {}", config.chunking.max_chunk_size);
    println!("  Chunk overlap:    {}", config.chunking.overlap);
    println!("  Upload limit:     {} bytes", config.upload.max_bytes);
    println!("  API key:          {}", if config.has_api_key() { "set" } else { "not set" });

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `mnemo init` first");
    }

    Ok(())
}
