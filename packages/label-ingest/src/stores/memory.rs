//! In-memory document store for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{StoreError, StoreResult};
use crate::traits::store::DocumentStore;
use crate::types::stored::StoredDocument;

/// In-memory document store keyed by slug.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, StoredDocument>>,
}

impl MemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a stored document.
    pub fn get(&self, slug: &str) -> Option<StoredDocument> {
        self.read().get(slug).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, StoredDocument>> {
        self.documents.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredDocument>> {
        self.documents.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<StoredDocument>> {
        Ok(self.get(slug))
    }

    async fn insert(&self, document: &StoredDocument) -> StoreResult<()> {
        let mut documents = self.write();
        if documents.contains_key(&document.slug) {
            return Err(StoreError::DuplicateSlug(document.slug.clone()));
        }
        documents.insert(document.slug.clone(), document.clone());
        Ok(())
    }

    async fn update(&self, document: &StoredDocument) -> StoreResult<bool> {
        let mut documents = self.write();
        let Some(existing) = documents.get_mut(&document.slug) else {
            return Ok(false);
        };
        existing.document = document.document.clone();
        existing.hash = document.hash.clone();
        existing.updated_at = document.updated_at;
        Ok(true)
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.len())
    }
}
