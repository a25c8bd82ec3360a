//! Configuration loading, validation, and management for Mnemo.
//!
//! Loads configuration from `~/.mnemo/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.mnemo/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider base URL (any OpenAI-compatible endpoint)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chat completion model
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Embedding model
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Expected embedding vector width
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Context assembly configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Document chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Upload limits
    #[serde(default)]
    pub upload: UploadConfig,

    /// Retry behavior for transient provider failures
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_embedding_dimensions() -> usize {
    1536
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .field("retrieval", &self.retrieval)
            .field("context", &self.context)
            .field("chunking", &self.chunking)
            .field("upload", &self.upload)
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// How many past-conversation summaries to retrieve per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Soft relevance floor; results below it are still returned but
    /// flagged as weak matches
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

fn default_top_k() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.30
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Completed turns from the active conversation to include
    #[serde(default = "default_recent_messages")]
    pub recent_messages_limit: usize,

    /// Cap on document chunks included per prompt
    #[serde(default = "default_max_document_chunks")]
    pub max_document_chunks: usize,

    /// Cap per profile fact bucket
    #[serde(default = "default_profile_facts_limit")]
    pub profile_facts_limit: usize,
}

fn default_recent_messages() -> usize {
    5
}
fn default_max_document_chunks() -> usize {
    1000
}
fn default_profile_facts_limit() -> usize {
    10
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recent_messages_limit: default_recent_messages(),
            max_document_chunks: default_max_document_chunks(),
            profile_facts_limit: default_profile_facts_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

fn default_max_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.mnemo/config.toml).
    ///
    /// Also checks environment variables:
    /// - `MNEMO_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `MNEMO_BASE_URL`
    /// - `MNEMO_CHAT_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("MNEMO_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(base_url) = std::env::var("MNEMO_BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(model) = std::env::var("MNEMO_CHAT_MODEL") {
            config.chat_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".mnemo")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            return Err(ConfigError::ValidationError(
                "retrieval.similarity_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.chunking.max_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.max_chunk_size must be at least 1".into(),
            ));
        }

        if self.chunking.overlap >= self.chunking.max_chunk_size {
            return Err(ConfigError::ValidationError(
                "chunking.overlap must be smaller than chunking.max_chunk_size".into(),
            ));
        }

        if self.embedding_dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding_dimensions must be at least 1".into(),
            ));
        }

        if self.upload.max_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_bytes must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for first-run setup).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            retrieval: RetrievalConfig::default(),
            context: ContextConfig::default(),
            chunking: ChunkingConfig::default(),
            upload: UploadConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
