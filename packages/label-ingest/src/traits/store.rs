//! Persistence for ingested labels.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::stored::StoredDocument;

/// Slug-keyed document storage.
///
/// Implementations must enforce slug uniqueness: a second insert for the
/// same slug fails with [`StoreError::DuplicateSlug`](crate::error::StoreError::DuplicateSlug)
/// so the importer can recover from a concurrent writer.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<StoredDocument>>;

    /// Insert a new document.
    async fn insert(&self, document: &StoredDocument) -> StoreResult<()>;

    /// Replace content, hash and `updated_at` of the document with the same
    /// slug. Returns `false` if no document matched.
    async fn update(&self, document: &StoredDocument) -> StoreResult<bool>;

    async fn count(&self) -> StoreResult<usize>;
}
