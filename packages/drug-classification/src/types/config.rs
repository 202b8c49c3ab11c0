//! Configuration for the classification subsystem.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Settings for the completion client, rate limiter and cache.
#[derive(Debug, Clone)]
pub struct ClassificationConfig {
    /// Master switch for the whole subsystem.
    ///
    /// Forced off by [`ClassificationConfig::from_env`] when no API key is set.
    pub enabled: bool,

    /// API key for the completion provider.
    pub api_key: Option<String>,

    /// Root URL of the OpenAI-compatible API.
    pub base_url: String,

    /// Completion model. Default: gpt-4o-mini.
    pub model: String,

    /// Maximum output tokens. Default: 2000.
    pub max_tokens: u32,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Per-request timeout. Default: 30s.
    pub request_timeout: Duration,

    /// Attempts per classification, including the first. Default: 3.
    pub max_retries: u32,

    /// Lifetime of a cache entry. Default: 24h.
    pub cache_ttl: Duration,

    /// Requests allowed per rate-limit window. Default: 60.
    pub rate_limit_requests: usize,

    /// Rate-limit window. Default: 60s.
    pub rate_limit_window: Duration,

    /// System prompt file; the built-in prompt is used when unset.
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: "https://api.openpipe.ai/api/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2000,
            temperature: 0.1,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            cache_ttl: Duration::from_secs(86_400),
            rate_limit_requests: 60,
            rate_limit_window: Duration::from_secs(60),
            system_prompt_path: None,
        }
    }
}

impl ClassificationConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    ///
    /// Booleans accept true/yes/1 and false/no/0. Unparseable numbers keep
    /// the default and log a warning. Without an API key the subsystem is
    /// disabled.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup("ENABLE_AI_CLASSIFICATION") {
            config.enabled = parse_bool("ENABLE_AI_CLASSIFICATION", &value, config.enabled);
        }
        config.api_key = lookup("OPENPIPE_API_KEY").filter(|key| !key.trim().is_empty());
        if let Some(value) = lookup("OPENPIPE_BASE_URL") {
            config.base_url = value;
        }
        if let Some(value) = lookup("AI_MODEL") {
            config.model = value;
        }
        if let Some(value) = lookup("AI_MAX_TOKENS") {
            config.max_tokens = parse_number("AI_MAX_TOKENS", &value, config.max_tokens);
        }
        if let Some(value) = lookup("AI_TEMPERATURE") {
            config.temperature = parse_number("AI_TEMPERATURE", &value, config.temperature);
        }
        if let Some(value) = lookup("AI_REQUEST_TIMEOUT") {
            config.request_timeout = Duration::from_secs(parse_number(
                "AI_REQUEST_TIMEOUT",
                &value,
                config.request_timeout.as_secs(),
            ));
        }
        if let Some(value) = lookup("AI_MAX_RETRIES") {
            config.max_retries = parse_number("AI_MAX_RETRIES", &value, config.max_retries);
        }
        if let Some(value) = lookup("AI_CLASSIFICATION_CACHE_TTL") {
            config.cache_ttl = Duration::from_secs(parse_number(
                "AI_CLASSIFICATION_CACHE_TTL",
                &value,
                config.cache_ttl.as_secs(),
            ));
        }
        if let Some(value) = lookup("AI_RATE_LIMIT_REQUESTS") {
            config.rate_limit_requests =
                parse_number("AI_RATE_LIMIT_REQUESTS", &value, config.rate_limit_requests);
        }
        if let Some(value) = lookup("AI_RATE_LIMIT_WINDOW") {
            config.rate_limit_window = Duration::from_secs(parse_number(
                "AI_RATE_LIMIT_WINDOW",
                &value,
                config.rate_limit_window.as_secs(),
            ));
        }
        config.system_prompt_path = lookup("SYSTEM_PROMPT_PATH").map(PathBuf::from);

        if config.enabled && config.api_key.is_none() {
            warn!("OPENPIPE_API_KEY not provided. AI classification will be disabled.");
            config.enabled = false;
        }

        config
    }

    /// Enable or disable classification.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the attempt budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the rate limit.
    pub fn with_rate_limit(mut self, requests: usize, window: Duration) -> Self {
        self.rate_limit_requests = requests;
        self.rate_limit_window = window;
        self
    }
}

fn parse_bool(key: &str, value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => true,
        "false" | "no" | "0" => false,
        _ => {
            warn!(key, value, default, "Invalid boolean, using default");
            default
        }
    }
}

fn parse_number<T>(key: &str, value: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    value.trim().parse().unwrap_or_else(|_| {
        warn!(key, value, %default, "Invalid number, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClassificationConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.rate_limit_requests, 60);
    }

    #[test]
    fn test_missing_api_key_disables() {
        let config = ClassificationConfig::from_lookup(lookup(&[]));
        assert!(!config.enabled);
    }

    #[test]
    fn test_env_overrides() {
        let config = ClassificationConfig::from_lookup(lookup(&[
            ("OPENPIPE_API_KEY", "opk-123"),
            ("AI_MODEL", "gpt-4o"),
            ("AI_MAX_RETRIES", "5"),
            ("AI_TEMPERATURE", "0.3"),
            ("AI_CLASSIFICATION_CACHE_TTL", "3600"),
            ("ENABLE_AI_CLASSIFICATION", "yes"),
        ]));
        assert!(config.enabled);
        assert_eq!(config.api_key.as_deref(), Some("opk-123"));
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_retries, 5);
        assert!((config.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_invalid_numbers_keep_defaults() {
        let config = ClassificationConfig::from_lookup(lookup(&[
            ("OPENPIPE_API_KEY", "opk-123"),
            ("AI_MAX_TOKENS", "lots"),
            ("AI_REQUEST_TIMEOUT", "-4"),
        ]));
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_explicitly_disabled() {
        let config = ClassificationConfig::from_lookup(lookup(&[
            ("OPENPIPE_API_KEY", "opk-123"),
            ("ENABLE_AI_CLASSIFICATION", "false"),
        ]));
        assert!(!config.enabled);
    }
}
