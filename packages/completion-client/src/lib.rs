//! Minimal client for OpenAI-compatible chat completion APIs.
//!
//! Sends a chat completion request and returns the first choice's text plus
//! token usage. Failures are mapped onto a small error taxonomy so callers
//! can decide how to retry:
//!
//! - HTTP 429 → [`CompletionError::RateLimited`]
//! - request timeout → [`CompletionError::Timeout`]
//! - connection failure → [`CompletionError::Network`]
//! - other non-2xx → [`CompletionError::Api`]
//! - undecodable body → [`CompletionError::Parse`]
//!
//! # Example
//!
//! ```rust,ignore
//! use completion_client::{ChatRequest, CompletionClient, Message};
//!
//! let client = CompletionClient::new(api_key)
//!     .with_base_url("https://api.openpipe.ai/api/v1")
//!     .with_timeout(Duration::from_secs(30))?;
//!
//! let completion = client
//!     .chat_completion(
//!         &ChatRequest::new("gpt-4o-mini")
//!             .message(Message::system(system_prompt))
//!             .message(Message::user(user_prompt))
//!             .json_object(),
//!     )
//!     .await?;
//! ```

pub mod error;
pub mod types;

pub use error::{CompletionError, Result};
pub use types::*;

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat completion client.
#[derive(Clone)]
pub struct CompletionClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl CompletionClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Set a custom base URL (OpenPipe, Azure, proxies, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Apply a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Config(e.to_string()))?;
        Ok(self)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat completion.
    ///
    /// Returns the content of the first choice.
    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<Completion> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Completion request failed");
                transport_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Completion API error");
            return Err(error_for_status(status, error_text));
        }

        let chat_response: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        let usage = chat_response.usage;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::Parse("response contained no message content".into()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            "Chat completion"
        );

        Ok(Completion { content, usage })
    }
}

fn transport_error(error: reqwest::Error) -> CompletionError {
    if error.is_timeout() {
        CompletionError::Timeout(error.to_string())
    } else {
        CompletionError::Network(error.to_string())
    }
}

/// Map a non-success status onto the error taxonomy.
pub fn error_for_status(status: StatusCode, body: String) -> CompletionError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        CompletionError::RateLimited(body)
    } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        CompletionError::Timeout(body)
    } else {
        CompletionError::Api {
            status: status.as_u16(),
            message: body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let client = CompletionClient::new("sk-test").with_base_url("https://custom.api.com/v1/");

        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.base_url(), "https://custom.api.com/v1");
    }

    #[test]
    fn test_with_timeout_builds() {
        let client = CompletionClient::new("sk-test")
            .with_timeout(Duration::from_secs(30))
            .unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_error_for_status() {
        assert!(error_for_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_rate_limit());
        assert!(matches!(
            error_for_status(StatusCode::GATEWAY_TIMEOUT, String::new()),
            CompletionError::Timeout(_)
        ));
        match error_for_status(StatusCode::BAD_GATEWAY, "upstream".into()) {
            CompletionError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
