//! Error types for the Mnemo domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Mnemo operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Access scope errors ---
    #[error("Scope error: {0}")]
    Scope(#[from] ScopeError),

    // --- Model / embedding provider errors ---
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    // --- Storage errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Missing resources ---
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // --- Request validation ---
    #[error("Validation error: {message}")]
    Validation { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Role-scoped access violations.
///
/// Retrieval paths degrade to empty results instead of raising these;
/// direct resource access raises them explicitly.
#[derive(Debug, Clone, Error)]
pub enum ScopeError {
    #[error("Access denied for {actor} on {resource}")]
    Denied { actor: String, resource: String },

    #[error("Actor {0} has no organization binding")]
    MissingOrganization(String),

    #[error("Actor {0} has no team binding")]
    MissingTeam(String),
}

/// Errors from the completion / embedding provider.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_displays_correctly() {
        let err = Error::Upstream(UpstreamError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn scope_error_displays_correctly() {
        let err = Error::Scope(ScopeError::Denied {
            actor: "user-7".into(),
            resource: "conversation c-42".into(),
        });
        assert!(err.to_string().contains("user-7"));
        assert!(err.to_string().contains("c-42"));
    }

    #[test]
    fn not_found_helper() {
        let err = Error::not_found("conversation", "abc");
        assert!(err.to_string().contains("conversation not found: abc"));
    }
}
