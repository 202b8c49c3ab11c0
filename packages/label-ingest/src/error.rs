//! Typed errors for label ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`DocumentStore`](crate::traits::store::DocumentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert collided with an existing document
    #[error("document with slug {0} already exists")]
    DuplicateSlug(String),

    /// Backend failure (connection, query)
    #[error("storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Stored document could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Wrap any backend error.
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}

/// Errors raised while ingesting labels.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Document failed schema validation
    #[error("validation error: {0}")]
    Validation(String),

    /// Document is not a JSON object
    #[error("document is not a JSON object")]
    NotAnObject,

    /// Document lacks a string `slug`
    #[error("missing required 'slug' field")]
    MissingSlug,

    /// An update matched no stored document
    #[error("update matched no document for slug: {slug}")]
    UpdateMissed { slug: String },

    /// Document store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Schema file could not be loaded
    #[error("schema error: {0}")]
    Schema(String),

    /// Label file could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Label file is not valid JSON
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client could not be built
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
