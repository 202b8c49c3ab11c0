//! Testing utilities including mock implementations.
//!
//! These let applications exercise the importer without a database, the
//! openFDA API or a completion backend.

use async_trait::async_trait;
use drug_classification::{ClassificationOutcome, Classifier, DrugDocument};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::stores::MemoryDocumentStore;
use crate::traits::image_lookup::ImageIdLookup;
use crate::traits::store::DocumentStore;
use crate::types::stored::StoredDocument;

/// A memory store that can simulate a concurrent writer and backend faults.
///
/// A racing document is written just before the next insert with the same
/// slug, which then fails with `DuplicateSlug`, as it would when another
/// importer won the race.
#[derive(Default)]
pub struct FlakyDocumentStore {
    inner: MemoryDocumentStore,
    racing: Mutex<HashMap<String, StoredDocument>>,
    fail_updates: bool,
    vanish_on_update: bool,
}

impl FlakyDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Have another writer insert `document` first.
    pub fn with_racing_insert(self, document: StoredDocument) -> Self {
        self.racing
            .lock()
            .unwrap()
            .insert(document.slug.clone(), document);
        self
    }

    /// Fail every update with a backend error.
    pub fn with_failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    /// Report updates as matching no document.
    pub fn with_vanishing_updates(mut self) -> Self {
        self.vanish_on_update = true;
        self
    }

    pub fn inner(&self) -> &MemoryDocumentStore {
        &self.inner
    }
}

#[async_trait]
impl DocumentStore for FlakyDocumentStore {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<StoredDocument>> {
        self.inner.find_by_slug(slug).await
    }

    async fn insert(&self, document: &StoredDocument) -> StoreResult<()> {
        let racer = self.racing.lock().unwrap().remove(&document.slug);
        if let Some(racer) = racer {
            self.inner.insert(&racer).await?;
        }
        self.inner.insert(document).await
    }

    async fn update(&self, document: &StoredDocument) -> StoreResult<bool> {
        if self.fail_updates {
            return Err(StoreError::backend("database is locked"));
        }
        if self.vanish_on_update {
            return Ok(false);
        }
        self.inner.update(document).await
    }

    async fn count(&self) -> StoreResult<usize> {
        self.inner.count().await
    }
}

/// Fixed drug name to SPL id mapping.
#[derive(Default)]
pub struct StaticImageLookup {
    ids: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StaticImageLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, drug_name: impl Into<String>, spl_id: impl Into<String>) -> Self {
        self.ids.insert(drug_name.into(), spl_id.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageIdLookup for StaticImageLookup {
    async fn spl_link_id(&self, drug_name: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ids.get(drug_name).cloned()
    }
}

/// Classifier returning a fixed outcome.
pub struct StubClassifier {
    outcome: ClassificationOutcome,
    enabled: bool,
    calls: AtomicUsize,
}

impl StubClassifier {
    pub fn new(outcome: ClassificationOutcome) -> Self {
        Self {
            outcome,
            enabled: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(ClassificationOutcome::unclassified())
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, _document: &DrugDocument) -> ClassificationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
