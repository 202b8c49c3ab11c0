//! Error types for the completion client.

use thiserror::Error;

/// Result type for completion client operations.
pub type Result<T> = std::result::Result<T, CompletionError>;

/// Completion client errors.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Configuration error (invalid settings, client could not be built)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failed before a response was received
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Provider rejected the request with HTTP 429
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Any other non-2xx response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

impl CompletionError {
    /// True for provider-side throttling.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}
