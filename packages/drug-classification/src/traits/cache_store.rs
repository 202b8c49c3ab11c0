//! Persistence for cached classifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::cache::CacheEntry;

/// Key-addressed storage for [`CacheEntry`] values.
///
/// Expiry is enforced by the caller on read; stores only need to filter
/// when asked through [`CacheStore::delete_expired`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get an entry by key, live or expired.
    async fn find(&self, cache_key: &str) -> Result<Option<CacheEntry>>;

    /// Insert or replace the entry with the same key.
    async fn replace(&self, entry: &CacheEntry) -> Result<()>;

    /// Delete entries created before `cutoff`. Returns the count removed.
    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Delete every entry. Returns the count removed.
    async fn delete_all(&self) -> Result<u64>;

    /// Delete entries whose `expires_at` is at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    /// Number of stored entries, live or expired.
    async fn count(&self) -> Result<usize>;

    /// Approximate bytes held by the store.
    async fn size_bytes(&self) -> Result<u64>;
}
