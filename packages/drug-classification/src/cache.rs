//! TTL cache for classifications, with usage metrics.
//!
//! The cache is advisory. Store failures are logged and counted, reads
//! degrade to a miss and writes report `false`. Nothing here returns an
//! error to the classification pipeline.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::document::DrugDocument;
use crate::hash::cache_key;
use crate::traits::cache_store::CacheStore;
use crate::types::cache::{CacheEntry, CacheEntryInfo, CacheStats};
use crate::types::classification::{
    CachedClassification, ClassificationMetadata, ClassificationResult,
};
use crate::validator::{validate_classification, validate_metadata};

/// Upper bound on entry lifetime, keeps `created_at + ttl` representable.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 86_400);

#[derive(Debug, Default)]
struct CacheMetrics {
    total_requests: u64,
    hits: u64,
    misses: u64,
    stores: u64,
    errors: u64,
    retrieval_time_total: f64,
    retrievals: u64,
    storage_time_total: f64,
    storage_ops: u64,
    size_bytes: u64,
    expired_entries_cleaned: u64,
}

/// Classification cache over a [`CacheStore`].
pub struct CacheManager<S: CacheStore> {
    store: S,
    ttl: chrono::Duration,
    metrics: Mutex<CacheMetrics>,
}

impl<S: CacheStore> CacheManager<S> {
    /// Create a cache whose entries live for `ttl`.
    pub fn new(store: S, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl.min(MAX_TTL))
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        Self {
            store,
            ttl,
            metrics: Mutex::new(CacheMetrics::default()),
        }
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Cache key for a document. See [`crate::hash::cache_key`].
    pub fn key_for(&self, document: &DrugDocument) -> String {
        cache_key(document)
    }

    /// Look up a live entry.
    ///
    /// Expired entries and store failures are reported as absent. The stored
    /// JSON is re-validated, and the returned metadata has `cached = true`.
    pub async fn get(&self, key: &str) -> Option<CachedClassification> {
        let started = Instant::now();
        self.metrics().total_requests += 1;

        let found = self.store.find(key).await;
        let retrieval_time = started.elapsed().as_secs_f64();

        let entry = match found {
            Ok(entry) => entry,
            Err(e) => {
                self.metrics().errors += 1;
                warn!(error = %e, "Cache retrieval error");
                return None;
            }
        };

        {
            let mut metrics = self.metrics();
            metrics.retrieval_time_total += retrieval_time;
            metrics.retrievals += 1;
        }

        let now = Utc::now();
        match entry.filter(|entry| entry.is_live_at(now)) {
            Some(entry) => {
                self.metrics().hits += 1;
                debug!(key = %abbreviate(key), retrieval_time, "Cache hit");

                let mut metadata = validate_metadata(&entry.metadata);
                metadata.cached = true;
                Some(CachedClassification {
                    classification: validate_classification(&entry.classification),
                    metadata,
                    cached_at: entry.created_at,
                    cache_age_seconds: seconds_between(entry.created_at, now).max(0.0),
                    retrieval_time,
                })
            }
            None => {
                self.metrics().misses += 1;
                debug!(key = %abbreviate(key), retrieval_time, "Cache miss");
                None
            }
        }
    }

    /// Store a classification under `key`, replacing any existing entry.
    ///
    /// Returns `false` if the store rejected the write.
    pub async fn put(
        &self,
        key: &str,
        classification: &ClassificationResult,
        metadata: &ClassificationMetadata,
    ) -> bool {
        let started = Instant::now();
        let entry = CacheEntry::new(
            key,
            classification.to_value(),
            metadata.to_value(),
            Utc::now(),
            self.ttl,
        );
        let size = entry.approximate_size() as u64;

        match self.store.replace(&entry).await {
            Ok(()) => {
                let storage_time = started.elapsed().as_secs_f64();
                let mut metrics = self.metrics();
                metrics.stores += 1;
                metrics.storage_time_total += storage_time;
                metrics.storage_ops += 1;
                metrics.size_bytes += size;
                debug!(key = %abbreviate(key), size, storage_time, "Stored classification in cache");
                true
            }
            Err(e) => {
                self.metrics().errors += 1;
                warn!(error = %e, "Cache storage error");
                false
            }
        }
    }

    /// Delete entries older than `older_than`, or every entry when `None`.
    ///
    /// Returns the number removed, 0 on store failure.
    pub async fn evict(&self, older_than: Option<Duration>) -> u64 {
        let result = match older_than {
            Some(age) => {
                let age = chrono::Duration::from_std(age.min(MAX_TTL))
                    .unwrap_or_else(|_| chrono::Duration::days(36_500));
                self.store.delete_created_before(Utc::now() - age).await
            }
            None => self.store.delete_all().await,
        };

        match result {
            Ok(count) => {
                info!(count, older_than_secs = older_than.map(|d| d.as_secs()), "Cleared cache entries");
                count
            }
            Err(e) => {
                error!(error = %e, "Failed to clear cache");
                0
            }
        }
    }

    /// Delete entries past their expiry. Returns the number removed.
    pub async fn purge_expired(&self) -> u64 {
        match self.store.delete_expired(Utc::now()).await {
            Ok(count) => {
                self.metrics().expired_entries_cleaned += count;
                if count > 0 {
                    info!(count, "Cleaned up expired cache entries");
                }
                count
            }
            Err(e) => {
                error!(error = %e, "Failed to clean up expired entries");
                0
            }
        }
    }

    /// Describe an entry without validating its classification.
    ///
    /// `None` when the key is absent or the store failed.
    pub async fn entry_info(&self, key: &str) -> Option<CacheEntryInfo> {
        let entry = match self.store.find(key).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(error = %e, "Failed to get cache info");
                return None;
            }
        };

        let now = Utc::now();
        Some(CacheEntryInfo {
            expired: !entry.is_live_at(now),
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            age_seconds: seconds_between(entry.created_at, now),
            ttl_remaining_seconds: seconds_between(now, entry.expires_at).max(0.0),
            metadata: entry.metadata,
        })
    }

    /// Snapshot of usage counters plus store-reported size.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = {
            let metrics = self.metrics();
            let ratio = |n: u64| {
                if metrics.total_requests > 0 {
                    n as f64 / metrics.total_requests as f64
                } else {
                    0.0
                }
            };
            let average = |total: f64, n: u64| if n > 0 { total / n as f64 } else { 0.0 };

            CacheStats {
                total_requests: metrics.total_requests,
                hits: metrics.hits,
                misses: metrics.misses,
                stores: metrics.stores,
                errors: metrics.errors,
                hit_rate: ratio(metrics.hits),
                miss_rate: ratio(metrics.misses),
                error_rate: ratio(metrics.errors),
                avg_retrieval_time: average(metrics.retrieval_time_total, metrics.retrievals),
                avg_storage_time: average(metrics.storage_time_total, metrics.storage_ops),
                estimated_size_bytes: metrics.size_bytes,
                expired_entries_cleaned: metrics.expired_entries_cleaned,
                total_entries: 0,
                stored_size_bytes: 0,
            }
        };

        match self.store.count().await {
            Ok(count) => stats.total_entries = count,
            Err(e) => warn!(error = %e, "Failed to count cache entries"),
        }
        match self.store.size_bytes().await {
            Ok(size) => stats.stored_size_bytes = size,
            Err(e) => warn!(error = %e, "Failed to measure cache size"),
        }

        stats
    }

    fn metrics(&self) -> MutexGuard<'_, CacheMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// Keys embed a digest; logs only need the readable prefix.
fn abbreviate(key: &str) -> &str {
    match key.char_indices().nth(50) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryCacheStore;
    use crate::testing::{sample_response, FailingCacheStore};
    use crate::types::classification::ConfidenceLevel;
    use serde_json::json;

    fn manager() -> CacheManager<MemoryCacheStore> {
        CacheManager::new(MemoryCacheStore::new(), Duration::from_secs(3600))
    }

    fn classification() -> ClassificationResult {
        validate_classification(&sample_response())
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = manager();
        let metadata = ClassificationMetadata {
            tokens_used: 812,
            attempts: 1,
            ..ClassificationMetadata::for_model("gpt-4o-mini")
        };

        assert!(cache.put("k1", &classification(), &metadata).await);
        let hit = cache.get("k1").await.unwrap();

        assert_eq!(hit.classification, classification());
        assert_eq!(hit.classification.confidence_level, ConfidenceLevel::High);
        assert!(hit.metadata.cached);
        assert_eq!(hit.metadata.tokens_used, 812);
        assert_eq!(hit.metadata.model, "gpt-4o-mini");
        assert!(hit.cache_age_seconds < 5.0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = manager();
        let past = Utc::now() - chrono::Duration::hours(2);
        let entry = CacheEntry::new(
            "k1",
            classification().to_value(),
            json!({}),
            past,
            chrono::Duration::hours(1),
        );
        cache.store().replace(&entry).await.unwrap();

        assert!(cache.get("k1").await.is_none());
        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.stats().await.expired_entries_cleaned, 1);
    }

    #[tokio::test]
    async fn test_put_replaces_existing_entry() {
        let cache = manager();
        let metadata = ClassificationMetadata::default();
        cache.put("k1", &ClassificationResult::default(), &metadata).await;
        cache.put("k1", &classification(), &metadata).await;

        assert_eq!(cache.store().len(), 1);
        let hit = cache.get("k1").await.unwrap();
        assert_eq!(hit.classification.atc_code, "A10BX16");
    }

    #[tokio::test]
    async fn test_malformed_stored_json_is_sanitized() {
        let cache = manager();
        let entry = CacheEntry::new(
            "k1",
            json!({"atc_code": "  C09AA05 ", "confidence_level": "certain"}),
            json!("not metadata"),
            Utc::now(),
            chrono::Duration::hours(1),
        );
        cache.store().replace(&entry).await.unwrap();

        let hit = cache.get("k1").await.unwrap();
        assert_eq!(hit.classification.atc_code, "C09AA05");
        assert_eq!(hit.classification.confidence_level, ConfidenceLevel::Low);
        assert!(hit.metadata.cached);
    }

    #[tokio::test]
    async fn test_metrics() {
        let cache = manager();
        cache.get("missing").await;
        cache.put("k1", &classification(), &ClassificationMetadata::default()).await;
        cache.get("k1").await;
        cache.get("k1").await;

        let stats = cache.stats().await;
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.stores, 1);
        assert_eq!(stats.errors, 0);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((stats.miss_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.total_entries, 1);
        assert!(stats.estimated_size_bytes > 0);
        assert!(stats.stored_size_bytes > 0);
    }

    #[tokio::test]
    async fn test_store_failures_degrade() {
        let cache = CacheManager::new(FailingCacheStore, Duration::from_secs(60));

        assert!(cache.get("k1").await.is_none());
        assert!(!cache.put("k1", &classification(), &ClassificationMetadata::default()).await);
        assert_eq!(cache.evict(None).await, 0);
        assert_eq!(cache.purge_expired().await, 0);
        assert!(cache.entry_info("k1").await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.total_requests, 1);
        assert!((stats.error_rate - 1.0).abs() < 1e-9);
        assert_eq!(stats.total_entries, 0);
    }

    #[tokio::test]
    async fn test_evict() {
        let cache = manager();
        let old = CacheEntry::new(
            "old",
            json!({}),
            json!({}),
            Utc::now() - chrono::Duration::hours(48),
            chrono::Duration::days(7),
        );
        cache.store().replace(&old).await.unwrap();
        cache.put("new", &classification(), &ClassificationMetadata::default()).await;

        assert_eq!(cache.evict(Some(Duration::from_secs(24 * 3600))).await, 1);
        assert_eq!(cache.evict(None).await, 1);
        assert!(cache.store().is_empty());
    }

    #[tokio::test]
    async fn test_entry_info() {
        let cache = manager();
        cache.put("k1", &classification(), &ClassificationMetadata::for_model("m")).await;

        let info = cache.entry_info("k1").await.unwrap();
        assert!(!info.expired);
        assert!(info.ttl_remaining_seconds > 3500.0);
        assert_eq!(info.metadata["model"], "m");
        assert!(cache.entry_info("missing").await.is_none());
    }

    #[test]
    fn test_key_for_uses_document_identity() {
        let cache = manager();
        let document = DrugDocument::new()
            .with("slug", "d1")
            .with("setId", "s1")
            .with("drugName", "X");
        assert!(cache.key_for(&document).starts_with("drug-classification:d1:s1:X:"));
    }
}
