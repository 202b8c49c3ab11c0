//! Rate-limited, retrying classification client.
//!
//! Each call runs up to `max_retries` attempts. Every attempt first takes a
//! permit from the [`RateLimiter`], then asks the model for a JSON object.
//! Failed attempts back off before the next one:
//!
//! - provider rate limiting (HTTP 429): `min(60, 2^attempt)` seconds
//! - anything else (network, timeout, API error, malformed JSON):
//!   `min(30, 2^(attempt-1))` seconds
//!
//! There is no sleep after the final attempt.

use completion_client::{strip_code_blocks, ChatRequest, CompletionClient, Message};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ClassificationError, Result};
use crate::rate_limit::RateLimiter;
use crate::traits::completion::CompletionApi;
use crate::types::classification::ClassificationMetadata;
use crate::types::config::ClassificationConfig;

/// Limiter waits longer than this mark the call as rate limited.
const RATE_LIMIT_WAIT_THRESHOLD: Duration = Duration::from_millis(100);

/// Backoff after a provider rate-limit rejection.
pub fn rate_limit_backoff(attempt: u32) -> Duration {
    let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX).min(60);
    Duration::from_secs(secs)
}

/// Backoff after any other failed attempt: 1, 2, 4, 8, 16, 30, 30, ...
pub fn transient_backoff(attempt: u32) -> Duration {
    let secs = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX)
        .min(30);
    Duration::from_secs(secs)
}

/// Lifetime counters of a [`ClassificationClient`].
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub model: String,
    pub total_requests: u64,
    pub total_tokens: u64,
    pub max_retries: u32,
    pub rate_limit_requests: usize,
    pub rate_limit_window_secs: u64,
}

/// Sends classification prompts to a completion backend.
pub struct ClassificationClient<A: CompletionApi> {
    api: A,
    limiter: RateLimiter,
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_retries: u32,
    total_requests: AtomicU64,
    total_tokens: AtomicU64,
}

impl ClassificationClient<CompletionClient> {
    /// Build an HTTP-backed client from configuration.
    ///
    /// Fails when no API key is configured or the HTTP client cannot be built.
    pub fn from_config(config: &ClassificationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| ClassificationError::Config("OPENPIPE_API_KEY is not set".into()))?;

        let http = CompletionClient::new(api_key)
            .with_base_url(config.base_url.as_str())
            .with_timeout(config.request_timeout)?;

        Ok(Self::new(http, config))
    }
}

impl<A: CompletionApi> ClassificationClient<A> {
    /// Wrap a completion backend with the configured limits.
    pub fn new(api: A, config: &ClassificationConfig) -> Self {
        Self {
            api,
            limiter: RateLimiter::new(config.rate_limit_requests, config.rate_limit_window),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries.max(1),
            total_requests: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the underlying backend.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Classify one prompt pair.
    ///
    /// Returns the parsed JSON object (unvalidated) and the call metadata.
    /// After the last failed attempt returns
    /// [`ClassificationError::RetriesExhausted`] wrapping the final failure.
    pub async fn classify(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<(Value, ClassificationMetadata)> {
        let started = Instant::now();
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let request = ChatRequest::new(self.model.as_str())
            .message(Message::system(system_prompt))
            .message(Message::user(user_prompt))
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .json_object();

        let mut metadata = ClassificationMetadata::for_model(self.model.as_str());
        let mut attempt = 0;

        loop {
            attempt += 1;
            metadata.attempts = attempt;

            if self.limiter.acquire().await > RATE_LIMIT_WAIT_THRESHOLD {
                metadata.rate_limited = true;
            }

            match self.attempt(&request).await {
                Ok((value, tokens)) => {
                    self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
                    metadata.tokens_used = tokens;
                    metadata.processing_time = started.elapsed().as_secs_f64();
                    info!(
                        model = %self.model,
                        attempt,
                        tokens,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Classification completed"
                    );
                    return Ok((value, metadata));
                }
                Err(err) => {
                    let backoff = if err.is_rate_limit() {
                        metadata.rate_limited = true;
                        rate_limit_backoff(attempt)
                    } else {
                        transient_backoff(attempt)
                    };

                    if attempt >= self.max_retries {
                        warn!(attempts = attempt, error = %err, "Classification failed, retries exhausted");
                        return Err(ClassificationError::RetriesExhausted {
                            attempts: attempt,
                            processing_time: started.elapsed().as_secs_f64(),
                            last_error: Box::new(err),
                        });
                    }

                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        backoff_secs = backoff.as_secs(),
                        error = %err,
                        "Classification attempt failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<(Value, u64)> {
        let completion = self.api.complete(request).await?;
        let tokens = completion.total_tokens();
        let value: Value = serde_json::from_str(strip_code_blocks(&completion.content))?;
        debug!(tokens, "Parsed classification response");
        Ok((value, tokens))
    }

    /// Snapshot of lifetime counters.
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            model: self.model.clone(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            max_retries: self.max_retries,
            rate_limit_requests: self.limiter.max_requests(),
            rate_limit_window_secs: self.limiter.window().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCompletion;
    use completion_client::CompletionError;

    fn config() -> ClassificationConfig {
        ClassificationConfig::default().with_api_key("opk-test")
    }

    #[test]
    fn test_backoff_schedules() {
        let transient: Vec<u64> = (1..=8).map(|a| transient_backoff(a).as_secs()).collect();
        assert_eq!(transient, vec![1, 2, 4, 8, 16, 30, 30, 30]);

        let throttled: Vec<u64> = (1..=7).map(|a| rate_limit_backoff(a).as_secs()).collect();
        assert_eq!(throttled, vec![2, 4, 8, 16, 32, 60, 60]);
        assert_eq!(rate_limit_backoff(200).as_secs(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let mock = MockCompletion::new().with_content(r#"{"atc_code": "N02BA01"}"#, 150);
        let client = ClassificationClient::new(mock, &config());

        let (value, metadata) = client.classify("system", "user").await.unwrap();

        assert_eq!(value["atc_code"], "N02BA01");
        assert_eq!(metadata.attempts, 1);
        assert_eq!(metadata.tokens_used, 150);
        assert_eq!(metadata.model, "gpt-4o-mini");
        assert!(!metadata.rate_limited);
        assert_eq!(client.stats().total_tokens, 150);
        assert_eq!(client.api().call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_fences_are_stripped() {
        let mock = MockCompletion::new().with_content("```json\n{\"atc_code\": \"A10\"}\n```", 10);
        let client = ClassificationClient::new(mock, &config());

        let (value, _) = client.classify("system", "user").await.unwrap();
        assert_eq!(value["atc_code"], "A10");
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_content_exhausts_retries() {
        let mock = MockCompletion::new().always_content("this is not json");
        let client = ClassificationClient::new(mock, &config().with_max_retries(3));
        let start = Instant::now();

        let err = client.classify("system", "user").await.unwrap_err();

        match err {
            ClassificationError::RetriesExhausted {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last_error, ClassificationError::InvalidJson(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.api().call_count(), 3);
        // 1s + 2s of backoff, nothing after the last attempt
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(client.stats().total_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_success() {
        let mock = MockCompletion::new()
            .with_error(CompletionError::RateLimited("429".into()))
            .with_content(r#"{"confidence_level": "High"}"#, 42);
        let client = ClassificationClient::new(mock, &config());
        let start = Instant::now();

        let (_, metadata) = client.classify("system", "user").await.unwrap();

        assert_eq!(metadata.attempts, 2);
        assert!(metadata.rate_limited);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert!((metadata.processing_time - 2.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_then_success() {
        let mock = MockCompletion::new()
            .with_error(CompletionError::Network("connection reset".into()))
            .with_error(CompletionError::Api {
                status: 500,
                message: "boom".into(),
            })
            .with_content("{}", 5);
        let client = ClassificationClient::new(mock, &config());
        let start = Instant::now();

        let (_, metadata) = client.classify("system", "user").await.unwrap();

        assert_eq!(metadata.attempts, 3);
        assert!(!metadata.rate_limited);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_calls_still_count_as_requests() {
        let client = ClassificationClient::new(
            MockCompletion::new().always_content("nope"),
            &config().with_max_retries(1),
        );
        assert!(client.classify("s", "u").await.is_err());
        assert!(client.classify("s", "u").await.is_err());

        let stats = client.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.total_tokens, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_shape() {
        let client = ClassificationClient::new(
            MockCompletion::new().with_content("{}", 1),
            &config().with_model("gpt-4o"),
        );
        client.classify("be precise", "Aspirin").await.unwrap();

        let requests = client.api().requests();
        let body = serde_json::to_value(&requests[0]).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["content"], "be precise");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let err = ClassificationClient::from_config(&ClassificationConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ClassificationError::Config(_)));
    }
}
