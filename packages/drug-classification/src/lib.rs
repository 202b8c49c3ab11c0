//! AI Therapeutic Classification for Drug Labels
//!
//! Classifies FDA drug labels into therapeutic, pharmacological and chemical
//! classes with an OpenAI-compatible completion API, and caches the result
//! under a key derived from the label content.
//!
//! # Design
//!
//! - Classification never fails the caller: errors degrade to an
//!   "unclassified" result that records the error
//! - The cache is advisory: store failures only cost a cache miss
//! - Model output is untrusted: every response passes through the validator
//! - Outbound calls are rate limited with a sliding window and retried with
//!   exponential backoff
//!
//! # Usage
//!
//! ```rust,ignore
//! use drug_classification::{ClassificationConfig, DrugClassifier, MemoryCacheStore};
//!
//! let config = ClassificationConfig::from_env();
//! let classifier = DrugClassifier::from_config(&config, MemoryCacheStore::new())?;
//!
//! let outcome = classifier.classify_document(&document).await;
//! println!("{}", outcome.classification.primary_therapeutic_class);
//! ```
//!
//! # Modules
//!
//! - [`document`] - Drug label document model
//! - [`hash`] - Content fingerprints and cache keys
//! - [`validator`] - Model output sanitization
//! - [`rate_limit`] - Sliding-window rate limiter
//! - [`client`] - Retrying classification client
//! - [`cache`] - TTL cache with metrics
//! - [`classifier`] - Orchestrator
//! - [`stores`] - Cache store implementations
//! - [`testing`] - Mock implementations for testing

pub mod cache;
pub mod classifier;
pub mod client;
pub mod document;
pub mod error;
pub mod hash;
pub mod prompts;
pub mod rate_limit;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod validator;

// Re-export core types at crate root
pub use cache::CacheManager;
pub use classifier::DrugClassifier;
pub use client::{ClassificationClient, ClientStats};
pub use document::{
    DrugDocument, CLASSIFICATION_FIELD, CLASSIFICATION_SECTIONS, PROCESSING_METADATA_FIELD,
    SYSTEM_FIELDS,
};
pub use error::{ClassificationError, Result};
pub use hash::{cache_key, document_hash};
pub use prompts::PromptManager;
pub use rate_limit::RateLimiter;
pub use traits::{cache_store::CacheStore, classifier::Classifier, completion::CompletionApi};
pub use types::{
    cache::{CacheEntry, CacheEntryInfo, CacheStats, WarmReport},
    classification::{
        CachedClassification, ClassificationMetadata, ClassificationOutcome,
        ClassificationResult, ConfidenceLevel, NOT_SPECIFIED,
    },
    config::ClassificationConfig,
};
pub use validator::{validate_classification, validate_metadata};

// Re-export stores
pub use stores::MemoryCacheStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteCacheStore;
