//! Typed errors for the classification library.

use completion_client::CompletionError;
use thiserror::Error;

/// Errors that can occur while classifying a drug label.
#[derive(Debug, Error)]
pub enum ClassificationError {
    /// Completion API call failed
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    /// Model output was not a JSON document
    #[error("invalid JSON in model response: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Every attempt failed
    #[error("classification failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        /// Seconds spent across all attempts, including backoff
        processing_time: f64,
        #[source]
        last_error: Box<ClassificationError>,
    },

    /// Cache backend failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// System prompt could not be loaded
    #[error("prompt error: {0}")]
    Prompt(String),
}

impl ClassificationError {
    /// Wrap any backend error as a storage failure.
    pub fn storage(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage(err.into())
    }

    /// Whether the provider signalled rate limiting.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::Completion(e) => e.is_rate_limit(),
            Self::RetriesExhausted { last_error, .. } => last_error.is_rate_limit(),
            _ => false,
        }
    }
}

/// Result type alias for classification operations.
pub type Result<T> = std::result::Result<T, ClassificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection_through_exhaustion() {
        let err = ClassificationError::RetriesExhausted {
            attempts: 3,
            processing_time: 7.0,
            last_error: Box::new(CompletionError::RateLimited("slow down".into()).into()),
        };
        assert!(err.is_rate_limit());
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn test_json_error_converts() {
        let err: ClassificationError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ClassificationError::InvalidJson(_)));
        assert!(!err.is_rate_limit());
    }
}
