use drug_classification::ClassificationConfig;
use std::env;

/// Default SQLite database, created on first use.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://drug_facts.db?mode=rwc";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub classification: ClassificationConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            classification: ClassificationConfig::from_env(),
        }
    }
}
