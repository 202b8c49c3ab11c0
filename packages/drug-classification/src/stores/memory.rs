//! In-memory cache store for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::traits::cache_store::CacheStore;
use crate::types::cache::CacheEntry;

/// In-memory cache store.
///
/// Entries are lost on restart.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, live or expired.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_where(&self, predicate: impl Fn(&CacheEntry) -> bool) -> u64 {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !predicate(entry));
        (before - entries.len()) as u64
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn find(&self, cache_key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.read().get(cache_key).cloned())
    }

    async fn replace(&self, entry: &CacheEntry) -> Result<()> {
        self.write().insert(entry.cache_key.clone(), entry.clone());
        Ok(())
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        Ok(self.remove_where(|entry| entry.created_at < cutoff))
    }

    async fn delete_all(&self) -> Result<u64> {
        Ok(self.remove_where(|_| true))
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        Ok(self.remove_where(|entry| !entry.is_live_at(now)))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.len())
    }

    async fn size_bytes(&self) -> Result<u64> {
        Ok(self
            .read()
            .values()
            .map(|entry| entry.approximate_size() as u64)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn entry(key: &str, created_at: DateTime<Utc>, ttl_secs: i64) -> CacheEntry {
        CacheEntry::new(key, json!({}), json!({}), created_at, Duration::seconds(ttl_secs))
    }

    #[tokio::test]
    async fn test_replace_is_an_upsert() {
        let store = MemoryCacheStore::new();
        let now = Utc::now();

        store.replace(&entry("k", now, 60)).await.unwrap();
        let mut updated = entry("k", now, 120);
        updated.classification = json!({"atc_code": "A10"});
        store.replace(&updated).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let found = store.find("k").await.unwrap().unwrap();
        assert_eq!(found.classification["atc_code"], "A10");
    }

    #[tokio::test]
    async fn test_deletes() {
        let store = MemoryCacheStore::new();
        let now = Utc::now();
        store.replace(&entry("old", now - Duration::hours(5), 60)).await.unwrap();
        store.replace(&entry("fresh", now, 3600)).await.unwrap();

        assert_eq!(store.delete_expired(now).await.unwrap(), 1);
        assert!(store.find("old").await.unwrap().is_none());

        store.replace(&entry("old", now - Duration::hours(5), 86_400)).await.unwrap();
        assert_eq!(store.delete_created_before(now - Duration::hours(1)).await.unwrap(), 1);
        assert_eq!(store.delete_all().await.unwrap(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_size_bytes_tracks_entries() {
        let store = MemoryCacheStore::new();
        assert_eq!(store.size_bytes().await.unwrap(), 0);
        store.replace(&entry("k", Utc::now(), 60)).await.unwrap();
        assert!(store.size_bytes().await.unwrap() > 0);
    }
}
