//! SQLite-backed [`Store`] implementation.
//!
//! Each [`store_documents`](Store::store_documents) call writes one row to
//! `batches` and one row per document to `documents`, inside a single
//! transaction, and returns a `sqlite:<uuid>` handle. Document order is
//! kept in the `position` column. A SHA-256 of the content is stored
//! alongside each row so downstream consumers can deduplicate across
//! batches.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use jira_harness_core::models::{CanonicalDocument, DataRef};
use jira_harness_core::store::Store;

use crate::config::Config;
use crate::{db, migrate};

/// Backend tag carried by every [`DataRef`] this store issues.
pub const SQLITE_BACKEND: &str = "sqlite";

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl Store for SqliteStore {
    async fn store_documents(&self, docs: &[CanonicalDocument]) -> Result<DataRef> {
        let batch_id = Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO batches (id, created_at, document_count) VALUES (?, ?, ?)")
            .bind(&batch_id)
            .bind(Utc::now().timestamp())
            .bind(docs.len() as i64)
            .execute(&mut *tx)
            .await?;

        for (position, doc) in docs.iter().enumerate() {
            let metadata_json = serde_json::to_string(&doc.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO documents (batch_id, position, id, source, title, url,
                                       content, metadata_json, updated_at, content_hash)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&batch_id)
            .bind(position as i64)
            .bind(&doc.id)
            .bind(&doc.source)
            .bind(&doc.title)
            .bind(&doc.url)
            .bind(&doc.content)
            .bind(&metadata_json)
            .bind(doc.updated_at.timestamp_millis())
            .bind(content_hash(&doc.content))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(batch = %batch_id, documents = docs.len(), "stored batch");

        Ok(DataRef {
            backend: SQLITE_BACKEND.to_string(),
            id: batch_id,
        })
    }

    async fn load_documents(&self, data_ref: &DataRef) -> Result<Option<Vec<CanonicalDocument>>> {
        if data_ref.backend != SQLITE_BACKEND {
            return Ok(None);
        }

        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM batches WHERE id = ?")
            .bind(&data_ref.id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Ok(None);
        }

        let rows = sqlx::query(
            r#"
            SELECT id, source, title, url, content, metadata_json, updated_at
            FROM documents
            WHERE batch_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(&data_ref.id)
        .fetch_all(&self.pool)
        .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let metadata_json: String = row.try_get("metadata_json")?;
            let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
                .with_context(|| format!("parse metadata for document {}", id))?;
            let updated_ms: i64 = row.try_get("updated_at")?;

            docs.push(CanonicalDocument {
                id,
                content: row.try_get("content")?,
                title: row.try_get("title")?,
                source: row.try_get("source")?,
                url: row.try_get("url")?,
                metadata,
                updated_at: DateTime::from_timestamp_millis(updated_ms).unwrap_or_default(),
            });
        }

        Ok(Some(docs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    async fn store(tmp: &TempDir) -> SqliteStore {
        let pool = db::connect_path(&tmp.path().join("data").join("jsync.sqlite"))
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn doc(id: &str, priority: Option<&str>) -> CanonicalDocument {
        let mut metadata = BTreeMap::new();
        metadata.insert("issue_key".to_string(), id.to_string());
        if let Some(p) = priority {
            metadata.insert("priority".to_string(), p.to_string());
        }
        CanonicalDocument {
            id: id.to_string(),
            content: format!("{} body", id),
            title: format!("{} title", id),
            source: "jira".to_string(),
            url: format!("https://acme.atlassian.net/rest/api/3/issue/{}", id),
            metadata,
            updated_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn stores_and_loads_in_order() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        let docs = vec![doc("ENG-3", Some("High")), doc("ENG-1", None), doc("ENG-2", None)];

        let r = store.store_documents(&docs).await.unwrap();
        assert_eq!(r.backend, "sqlite");

        let loaded = store.load_documents(&r).await.unwrap().unwrap();
        assert_eq!(loaded, docs);
    }

    #[tokio::test]
    async fn empty_batch_is_still_addressable() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        let r = store.store_documents(&[]).await.unwrap();
        assert_eq!(store.load_documents(&r).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn unknown_or_foreign_refs_are_none() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;

        let unknown = DataRef {
            backend: "sqlite".to_string(),
            id: "missing".to_string(),
        };
        assert!(store.load_documents(&unknown).await.unwrap().is_none());

        let foreign = DataRef {
            backend: "memory".to_string(),
            id: "x".to_string(),
        };
        assert!(store.load_documents(&foreign).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        migrate::apply(store.pool()).await.unwrap();
    }

    #[test]
    fn content_hash_is_hex_sha256() {
        let h = content_hash("abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
