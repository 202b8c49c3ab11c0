//! SQLite document store.
//!
//! One row per slug; the label content is stored as a JSON text column.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::DocumentStore;
use crate::types::stored::StoredDocument;

/// SQLite-backed document store.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Connect and create the `drugs` table if needed.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (use [`Self::in_memory`])
    /// - `sqlite://drug_facts.db?mode=rwc` - Create if not exists
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StoreError::backend)?;

        Self::from_pool(pool).await
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::backend)?;

        Self::from_pool(pool).await
    }

    /// Use an existing pool, running migrations on it.
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS drugs (
                slug TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

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

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::backend(format!("Invalid date: {}", e)))
}

#[derive(Debug, FromRow)]
struct DrugRow {
    slug: String,
    document: String,
    content_hash: String,
    created_at: String,
    updated_at: String,
}

impl DrugRow {
    fn into_stored(self) -> StoreResult<StoredDocument> {
        Ok(StoredDocument {
            document: serde_json::from_str(&self.document)?,
            hash: self.content_hash,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            slug: self.slug,
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find_by_slug(&self, slug: &str) -> StoreResult<Option<StoredDocument>> {
        let row = sqlx::query_as::<_, DrugRow>(
            "SELECT slug, document, content_hash, created_at, updated_at FROM drugs WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(DrugRow::into_stored).transpose()
    }

    async fn insert(&self, document: &StoredDocument) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO drugs (slug, document, content_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.slug)
        .bind(serde_json::to_string(&document.document)?)
        .bind(&document.hash)
        .bind(timestamp(document.created_at))
        .bind(timestamp(document.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateSlug(document.slug.clone()))
            }
            Err(e) => Err(StoreError::backend(e)),
        }
    }

    async fn update(&self, document: &StoredDocument) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE drugs SET document = ?, content_hash = ?, updated_at = ? WHERE slug = ?",
        )
        .bind(serde_json::to_string(&document.document)?)
        .bind(&document.hash)
        .bind(timestamp(document.updated_at))
        .bind(&document.slug)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM drugs")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(count.max(0) as usize)
    }
}
