//! Model provider clients.
//!
//! Works with OpenAI and any endpoint exposing OpenAI-compatible
//! `/chat/completions` and `/embeddings` routes (vLLM, Together AI,
//! Fireworks AI, local proxies).

mod openai;

pub use openai::OpenAiClient;
