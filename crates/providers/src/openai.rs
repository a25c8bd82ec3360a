//! OpenAI-compatible client implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mnemo_core::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, Error, ModelClient, Result,
    Usage, UpstreamError,
};

/// Maximum inputs per embedding request; larger batches are split.
const EMBED_BATCH_SIZE: usize = 100;

/// An OpenAI-compatible model client.
///
/// Handles both chat completions and embeddings since most providers expose
/// the same two routes.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            client,
        }
    }

    /// Create a client against api.openai.com (convenience constructor).
    pub fn openai(
        api_key: impl Into<String>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self::new("https://api.openai.com/v1", api_key, chat_model, embedding_model)
    }

    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    ChatRole::System => "system".into(),
                    ChatRole::User => "user".into(),
                    ChatRole::Assistant => "assistant".into(),
                },
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn check_status(status: u16) -> std::result::Result<(), UpstreamError> {
        if status == 429 {
            return Err(UpstreamError::RateLimited {
                retry_after_secs: 5,
            });
        }
        if status == 401 || status == 403 {
            return Err(UpstreamError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }
        Ok(())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": texts,
            "encoding_format": "float",
        });

        debug!(model = %self.embedding_model, count = texts.len(), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        Self::check_status(status)?;
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Embedding endpoint returned error");
            return Err(UpstreamError::ApiError {
                status_code: status,
                message: error_body,
            }
            .into());
        }

        let api_resp: EmbeddingApiResponse =
            response.json().await.map_err(|e| UpstreamError::InvalidResponse(format!("Failed to parse embedding response: {e}")))?;

        if api_resp.data.len() != texts.len() {
            return Err(UpstreamError::InvalidResponse(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                api_resp.data.len()
            ))
            .into());
        }

        // Providers may reorder batch results; the index field restores
        // input order.
        let mut data = api_resp.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.chat_model,
            "messages": Self::to_api_messages(&request.messages),
            "stream": false,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(model = %self.chat_model, messages = request.messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        Self::check_status(status)?;
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Completion endpoint returned error");
            return Err(UpstreamError::ApiError {
                status_code: status,
                message: error_body,
            }
            .into());
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| UpstreamError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            Error::from(UpstreamError::InvalidResponse("No choices in response".into()))
        })?;

        let usage = api_response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            embeddings.extend(self.embed_batch(batch).await?);
        }
        Ok(embeddings)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_conversion() {
        let messages = vec![ChatMessage::system("You are helpful"), ChatMessage::user("Hello")];
        let api_messages = OpenAiClient::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            OpenAiClient::check_status(429),
            Err(UpstreamError::RateLimited { .. })
        ));
        assert!(matches!(
            OpenAiClient::check_status(401),
            Err(UpstreamError::AuthenticationFailed(_))
        ));
        assert!(OpenAiClient::check_status(200).is_ok());
        // Other statuses are handled by the caller with the response body.
        assert!(OpenAiClient::check_status(500).is_ok());
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Hi there")
        );
        assert_eq!(parsed.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_embedding_response_with_indices() {
        let data = r#"{
            "data": [
                {"embedding": [0.4, 0.5], "index": 1},
                {"embedding": [0.1, 0.2], "index": 0}
            ],
            "model": "text-embedding-3-small"
        }"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(data).unwrap();
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        assert_eq!(data[0].embedding, vec![0.1, 0.2]);
        assert_eq!(data[1].embedding, vec![0.4, 0.5]);
    }

    #[test]
    fn debug_redacts_api_key() {
        let client = OpenAiClient::openai("sk-secret", "gpt-4o-mini", "text-embedding-3-small");
        let rendered = format!("{client:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("sk-secret"));
    }
}
