//! SQLite cache store.
//!
//! One row per cache key. Timestamps are stored as fixed-width RFC 3339 UTC
//! strings so range predicates can compare them as text.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{ClassificationError, Result};
use crate::traits::cache_store::CacheStore;
use crate::types::cache::CacheEntry;

/// SQLite-backed cache store.
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Connect and create the cache table if needed.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (use [`Self::in_memory`])
    /// - `sqlite://drug_facts.db?mode=rwc` - Create if not exists
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(ClassificationError::storage)?;

        Self::from_pool(pool).await
    }

    /// Create an in-memory store (for testing).
    ///
    /// Limited to a single connection, since every connection to
    /// `sqlite::memory:` opens its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(ClassificationError::storage)?;

        Self::from_pool(pool).await
    }

    /// Use an existing pool, running migrations on it.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ai_classification_cache (
                cache_key TEXT PRIMARY KEY,
                classification TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_classification_cache_expires_at
                ON ai_classification_cache(expires_at);
            CREATE INDEX IF NOT EXISTS idx_classification_cache_created_at
                ON ai_classification_cache(created_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(ClassificationError::storage)?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| ClassificationError::storage(format!("Invalid date: {}", e)))
}

#[derive(Debug, FromRow)]
struct CacheRow {
    cache_key: String,
    classification: String,
    metadata: String,
    created_at: String,
    expires_at: String,
}

impl CacheRow {
    fn into_entry(self) -> Result<CacheEntry> {
        Ok(CacheEntry {
            classification: serde_json::from_str(&self.classification)?,
            metadata: serde_json::from_str(&self.metadata)?,
            created_at: parse_timestamp(&self.created_at)?,
            expires_at: parse_timestamp(&self.expires_at)?,
            cache_key: self.cache_key,
        })
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn find(&self, cache_key: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, CacheRow>(
            "SELECT cache_key, classification, metadata, created_at, expires_at FROM ai_classification_cache WHERE cache_key = ?",
        )
        .bind(cache_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(ClassificationError::storage)?;

        row.map(CacheRow::into_entry).transpose()
    }

    async fn replace(&self, entry: &CacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ai_classification_cache (cache_key, classification, metadata, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                classification = excluded.classification,
                metadata = excluded.metadata,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&entry.cache_key)
        .bind(entry.classification.to_string())
        .bind(entry.metadata.to_string())
        .bind(timestamp(entry.created_at))
        .bind(timestamp(entry.expires_at))
        .execute(&self.pool)
        .await
        .map_err(ClassificationError::storage)?;

        Ok(())
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ai_classification_cache WHERE created_at < ?")
            .bind(timestamp(cutoff))
            .execute(&self.pool)
            .await
            .map_err(ClassificationError::storage)?;

        Ok(result.rows_affected())
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ai_classification_cache")
            .execute(&self.pool)
            .await
            .map_err(ClassificationError::storage)?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ai_classification_cache WHERE expires_at <= ?")
            .bind(timestamp(now))
            .execute(&self.pool)
            .await
            .map_err(ClassificationError::storage)?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_classification_cache")
            .fetch_one(&self.pool)
            .await
            .map_err(ClassificationError::storage)?;

        Ok(count.max(0) as usize)
    }

    async fn size_bytes(&self) -> Result<u64> {
        let size: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(
                LENGTH(cache_key) + LENGTH(classification) + LENGTH(metadata)
                + LENGTH(created_at) + LENGTH(expires_at)
            ), 0)
            FROM ai_classification_cache
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(ClassificationError::storage)?;

        Ok(size.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    async fn test_store() -> SqliteCacheStore {
        SqliteCacheStore::in_memory().await.unwrap()
    }

    fn entry(key: &str, created_at: DateTime<Utc>, ttl_secs: i64) -> CacheEntry {
        CacheEntry::new(
            key,
            json!({"atc_code": "N02BA01"}),
            json!({"model": "gpt-4o-mini"}),
            created_at,
            Duration::seconds(ttl_secs),
        )
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = test_store().await;
        let original = entry("k1", Utc::now(), 3600);
        store.replace(&original).await.unwrap();

        let found = store.find("k1").await.unwrap().unwrap();
        assert_eq!(found.classification, original.classification);
        assert_eq!(found.metadata, original.metadata);
        assert_eq!(found.expires_at.timestamp_micros(), original.expires_at.timestamp_micros());
        assert!(store.find("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_does_not_duplicate() {
        let store = test_store().await;
        let now = Utc::now();
        store.replace(&entry("k1", now, 60)).await.unwrap();
        store.replace(&entry("k1", now, 120)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let found = store.find("k1").await.unwrap().unwrap();
        assert_eq!(found.expires_at - found.created_at, Duration::seconds(120));
    }

    #[tokio::test]
    async fn test_delete_expired_and_old() {
        let store = test_store().await;
        let now = Utc::now();
        store.replace(&entry("expired", now - Duration::hours(2), 60)).await.unwrap();
        store.replace(&entry("old", now - Duration::hours(30), 86_400 * 7)).await.unwrap();
        store.replace(&entry("fresh", now, 3600)).await.unwrap();

        assert_eq!(store.delete_expired(now).await.unwrap(), 1);
        assert_eq!(store.delete_created_before(now - Duration::hours(24)).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.size_bytes().await.unwrap() > 0);
        assert_eq!(store.delete_all().await.unwrap(), 1);
    }
}
