//! SQLite document store
//!
//! One `documents` table holds every collection; the JSON payload is kept
//! as text and merged in Rust on patch.

use super::{merge_patch, Collection, DocumentStore};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Open a pool for `database_url` and ensure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Self::new(pool).await
    }

    /// Wrap an existing pool and ensure the schema exists.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (collection, id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert(&self, collection: Collection, id: Uuid, document: Value) -> Result<()> {
        let payload = serde_json::to_string(&document)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, payload, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(collection.as_str())
        .bind(id.to_string())
        .bind(&payload)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_all(&self, collection: Collection) -> Result<Vec<Value>> {
        let rows = sqlx::query(
            r#"
            SELECT payload
            FROM documents
            WHERE collection = ?
            ORDER BY seq DESC
            "#,
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.get("payload");
            documents.push(serde_json::from_str(&payload)?);
        }
        Ok(documents)
    }

    async fn update_by_id(&self, collection: Collection, id: Uuid, patch: Value) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT payload FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(false);
        };

        let payload: String = row.get("payload");
        let mut document: Value = serde_json::from_str(&payload)?;
        merge_patch(&mut document, patch)?;

        sqlx::query(
            r#"
            UPDATE documents
            SET payload = ?, updated_at = ?
            WHERE collection = ? AND id = ?
            "#,
        )
        .bind(serde_json::to_string(&document)?)
        .bind(Utc::now().to_rfc3339())
        .bind(collection.as_str())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn memory_store() -> SqliteDocumentStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteDocumentStore::new(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_find_all_returns_newest_first() {
        let store = memory_store().await;
        for n in 0..3 {
            store
                .insert(Collection::Boards, Uuid::new_v4(), json!({ "n": n }))
                .await
                .unwrap();
        }

        let documents = store.find_all(Collection::Boards).await.unwrap();
        let order: Vec<i64> = documents.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![2, 1, 0]);
        assert!(store.find_all(Collection::Images).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_by_id_merges_patch() {
        let store = memory_store().await;
        let id = Uuid::new_v4();
        store
            .insert(
                Collection::Images,
                id,
                json!({ "prompt": "a lighthouse", "isRelocated": false }),
            )
            .await
            .unwrap();

        let updated = store
            .update_by_id(Collection::Images, id, json!({ "isRelocated": true }))
            .await
            .unwrap();

        assert!(updated);
        let documents = store.find_all(Collection::Images).await.unwrap();
        assert_eq!(
            documents,
            vec![json!({ "prompt": "a lighthouse", "isRelocated": true })]
        );
    }

    #[tokio::test]
    async fn test_update_by_id_unknown_id() {
        let store = memory_store().await;

        let updated = store
            .update_by_id(Collection::Boards, Uuid::new_v4(), json!({ "x": 1 }))
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = memory_store().await;
        let id = Uuid::new_v4();
        store.insert(Collection::Feedback, id, json!({})).await.unwrap();

        let err = store
            .insert(Collection::Feedback, id, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists_across_pools() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("boards.db").display());
        let id = Uuid::new_v4();

        {
            let store = SqliteDocumentStore::connect(&url).await.unwrap();
            store
                .insert(Collection::Boards, id, json!({ "goals": ["learn guitar"] }))
                .await
                .unwrap();
            store.pool().close().await;
        }

        let reopened = SqliteDocumentStore::connect(&url).await.unwrap();
        let documents = reopened.find_all(Collection::Boards).await.unwrap();
        assert_eq!(documents, vec![json!({ "goals": ["learn guitar"] })]);
    }
}
