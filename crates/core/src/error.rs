//! Error types for the Flowdeck domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Flowdeck operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Store errors (history, vector index, artifacts) ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Flow errors ---
    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short machine-readable status, used in HTTP error envelopes.
    pub fn status(&self) -> &'static str {
        match self {
            Error::Flow(FlowError::NotFound(_)) => "NOT_FOUND",
            Error::Flow(FlowError::InvalidInput(_)) => "INVALID_ARGUMENT",
            Error::Provider(ProviderError::RateLimited { .. }) => "RESOURCE_EXHAUSTED",
            Error::Provider(ProviderError::AuthenticationFailed(_)) => "UNAUTHENTICATED",
            Error::Provider(ProviderError::ModelNotFound(_)) => "NOT_FOUND",
            Error::Config { .. } | Error::Provider(ProviderError::NotConfigured(_)) => {
                "FAILED_PRECONDITION"
            }
            _ => "INTERNAL",
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Response blocked: {0}")]
    Blocked(String),

    #[error("Provider returned no candidates")]
    EmptyResponse,

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// The tool paused the generation and needs outside input to continue.
    #[error("Tool interrupted: {tool_name}")]
    Interrupted {
        tool_name: String,
        metadata: serde_json::Value,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Path escapes the artifact root: {0}")]
    PathEscape(String),

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(String),
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Flow not found: {0}")]
    NotFound(String),

    #[error("Invalid flow input: {0}")]
    InvalidInput(String),

    #[error("No media generated: {0}")]
    NoMedia(String),

    #[error("Model output did not match the schema: {0}")]
    OutputParse(String),

    #[error("Exceeded maximum tool turns ({0})")]
    MaxTurnsExceeded(u32),

    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn interrupted_tool_error_keeps_name() {
        let err = Error::Tool(ToolError::Interrupted {
            tool_name: "askUser".into(),
            metadata: serde_json::json!({"question": "Which city?"}),
        });
        assert!(err.to_string().contains("askUser"));
    }

    #[test]
    fn status_codes_for_envelopes() {
        assert_eq!(Error::Flow(FlowError::NotFound("x".into())).status(), "NOT_FOUND");
        assert_eq!(
            Error::Flow(FlowError::InvalidInput("bad".into())).status(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(
            Error::Provider(ProviderError::RateLimited { retry_after_secs: 5 }).status(),
            "RESOURCE_EXHAUSTED"
        );
        assert_eq!(Error::Internal("boom".into()).status(), "INTERNAL");

        // Raised while building outputs, never by client input.
        let ser = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(Error::Serialization(ser).status(), "INTERNAL");
    }
}
