//! Cache entry and cache reporting types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A persisted classification, addressed by its cache key.
///
/// `classification` and `metadata` are stored as raw JSON and sanitized on
/// read, so a hand-edited or older-format row still yields a valid result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: String,
    pub classification: Value,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry that expires `ttl` after `created_at`.
    pub fn new(
        cache_key: impl Into<String>,
        classification: Value,
        metadata: Value,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache_key: cache_key.into(),
            classification,
            metadata,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// Live entries expire strictly after `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Approximate serialized size in bytes.
    pub fn approximate_size(&self) -> usize {
        serde_json::to_string(self).map(|s| s.len()).unwrap_or(0)
    }
}

/// Summary of one entry without its classification body.
#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    pub expired: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub age_seconds: f64,
    /// Zero once expired
    pub ttl_remaining_seconds: f64,
    pub metadata: Value,
}

/// Snapshot of cache usage counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub errors: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub error_rate: f64,
    /// Seconds
    pub avg_retrieval_time: f64,
    /// Seconds
    pub avg_storage_time: f64,
    /// Sum of serialized sizes written by this instance
    pub estimated_size_bytes: u64,
    pub expired_entries_cleaned: u64,
    /// Entries currently held by the store (0 if the store could not be read)
    pub total_entries: usize,
    /// Bytes reported by the store (0 if the store could not be read)
    pub stored_size_bytes: u64,
}

/// Result of pre-populating the cache.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WarmReport {
    pub total: usize,
    pub already_cached: usize,
    pub newly_cached: usize,
    pub failed: usize,
    /// Seconds
    pub processing_time: f64,
}
