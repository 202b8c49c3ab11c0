//! Testing utilities including mock implementations.
//!
//! These let applications exercise the classification pipeline without
//! network calls or a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use completion_client::{ChatRequest, Completion, CompletionError, Usage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ClassificationError, Result};
use crate::traits::cache_store::CacheStore;
use crate::traits::completion::CompletionApi;
use crate::types::cache::CacheEntry;

/// A scripted completion backend.
///
/// Queued responses are returned in order. Once the queue is empty the
/// fallback content is returned, or a parse error if none is set.
#[derive(Default, Clone)]
pub struct MockCompletion {
    queue: Arc<Mutex<VecDeque<std::result::Result<Completion, CompletionError>>>>,
    fallback: Option<String>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    calls: Arc<AtomicUsize>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn with_content(self, content: impl Into<String>, total_tokens: u32) -> Self {
        self.queue.lock().unwrap().push_back(Ok(Completion {
            content: content.into(),
            usage: Some(Usage {
                prompt_tokens: 0,
                completion_tokens: total_tokens,
                total_tokens,
            }),
        }));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, error: CompletionError) -> Self {
        self.queue.lock().unwrap().push_back(Err(error));
        self
    }

    /// Content returned whenever the queue is empty.
    pub fn always_content(mut self, content: impl Into<String>) -> Self {
        self.fallback = Some(content.into());
        self
    }

    /// Number of completion calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionApi for MockCompletion {
    async fn complete(
        &self,
        request: &ChatRequest,
    ) -> std::result::Result<Completion, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            return next;
        }
        match &self.fallback {
            Some(content) => Ok(Completion {
                content: content.clone(),
                usage: None,
            }),
            None => Err(CompletionError::Parse("mock response queue is empty".into())),
        }
    }
}

/// A cache store whose every operation fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingCacheStore;

impl FailingCacheStore {
    fn fail<T>() -> Result<T> {
        Err(ClassificationError::storage("cache backend unavailable"))
    }
}

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn find(&self, _cache_key: &str) -> Result<Option<CacheEntry>> {
        Self::fail()
    }

    async fn replace(&self, _entry: &CacheEntry) -> Result<()> {
        Self::fail()
    }

    async fn delete_created_before(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        Self::fail()
    }

    async fn delete_all(&self) -> Result<u64> {
        Self::fail()
    }

    async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<u64> {
        Self::fail()
    }

    async fn count(&self) -> Result<usize> {
        Self::fail()
    }

    async fn size_bytes(&self) -> Result<u64> {
        Self::fail()
    }
}

/// A well-formed model response for test fixtures.
pub fn sample_response() -> serde_json::Value {
    serde_json::json!({
        "primary_therapeutic_class": "Antidiabetic",
        "pharmacological_class": "GIP and GLP-1 receptor agonist",
        "chemical_class": "Polypeptide",
        "atc_code": "A10BX16",
        "controlled_substance_schedule": "Not controlled",
        "therapeutic_indication": "Glycemic control in type 2 diabetes mellitus",
        "mechanism_of_action_summary": "Activates GIP and GLP-1 receptors",
        "confidence_level": "High",
        "source_sections_used": ["Indications and Usage", "Mechanism of Action"]
    })
}
