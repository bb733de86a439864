//! Error types for reply generation.

use thiserror::Error;

/// Result type for provider and chain operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors raised while generating a reply.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Provider '{provider}' timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    #[error("Provider '{provider}' network error: {message}")]
    Transport { provider: String, message: String },

    #[error("Provider '{provider}' returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Provider '{provider}' returned a malformed payload: {message}")]
    MalformedPayload { provider: String, message: String },

    #[error("Provider '{provider}' returned an empty reply")]
    EmptyReply { provider: String },

    #[error("Provider '{provider}' is not configured: {reason}")]
    NotConfigured { provider: String, reason: String },

    #[error("All providers failed (attempted: {attempted:?})")]
    AllProvidersExhausted { attempted: Vec<String> },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LlmError {
    /// Failures the fallback chain absorbs by moving to the next provider.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Transport { .. }
                | Self::Status { .. }
                | Self::MalformedPayload { .. }
                | Self::EmptyReply { .. }
        )
    }
}
