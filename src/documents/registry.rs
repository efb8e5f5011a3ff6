//! Document registry — relational metadata store for uploaded documents.
//!
//! All lookups are scoped by `(tenant_id, document_id)`; an unknown id
//! and a tenant mismatch are indistinguishable on purpose.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::ApiError;

/// Lifecycle states of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Processed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::Processed => "processed",
            DocumentStatus::Failed => "failed",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "processed" => DocumentStatus::Processed,
            "failed" => DocumentStatus::Failed,
            _ => DocumentStatus::Processing,
        }
    }
}

/// One registered document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub content_length: i64,
    pub status: DocumentStatus,
    /// Authoritative only while status is `processed`.
    pub chunk_count: i64,
    pub storage_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new registration; the registry assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub tenant_id: String,
    pub user_id: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub content_length: i64,
}

/// Optional fields applied alongside a status change.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub chunk_count: Option<i64>,
    pub content_length: Option<i64>,
    pub storage_url: Option<String>,
}

/// Per-tenant aggregate over registry rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantStats {
    pub total_documents: i64,
    pub processed_documents: i64,
    pub processing_documents: i64,
    pub failed_documents: i64,
    pub total_size_bytes: i64,
    pub total_chunks: i64,
}

/// Collaborator contract for document metadata persistence.
#[async_trait]
pub trait DocumentRegistry: Send + Sync {
    /// Register a document in `processing` state.
    async fn create(&self, new: NewDocument) -> Result<Document, ApiError>;

    /// Fetch by id within a tenant. `None` covers both unknown id and
    /// tenant mismatch.
    async fn get(&self, tenant_id: &str, document_id: &str) -> Result<Option<Document>, ApiError>;

    /// Tenant's documents, newest first, with limit/offset pagination.
    async fn list(
        &self,
        tenant_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>, ApiError>;

    /// Change status and apply any accompanying field updates.
    async fn update_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        update: StatusUpdate,
    ) -> Result<(), ApiError>;

    /// Remove the row. Returns false when nothing matched.
    async fn delete(&self, tenant_id: &str, document_id: &str) -> Result<bool, ApiError>;

    /// Aggregate counts and sizes for a tenant.
    async fn stats(&self, tenant_id: &str) -> Result<TenantStats, ApiError>;
}

/// SQLite-backed registry implementation.
pub struct SqliteDocumentRegistry {
    pool: SqlitePool,
}

impl SqliteDocumentRegistry {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::storage)?;

        let registry = Self { pool };
        registry.init_schema().await?;
        Ok(registry)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                user_id TEXT NOT NULL DEFAULT '',
                filename TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL DEFAULT 0,
                content_length INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'processing',
                chunk_count INTEGER NOT NULL DEFAULT 0,
                storage_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_tenant
             ON documents(tenant_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        Ok(())
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
        let status: String = row.get("status");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        Document {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            user_id: row.get("user_id"),
            filename: row.get("filename"),
            file_type: row.get("file_type"),
            file_size: row.get("file_size"),
            content_length: row.get("content_length"),
            status: DocumentStatus::from_str(&status),
            chunk_count: row.get("chunk_count"),
            storage_url: row.get("storage_url"),
            created_at: created_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
            updated_at: updated_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

#[async_trait]
impl DocumentRegistry for SqliteDocumentRegistry {
    async fn create(&self, new: NewDocument) -> Result<Document, ApiError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO documents
             (id, tenant_id, user_id, filename, file_type, file_size, content_length,
              status, chunk_count, storage_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'processing', 0, NULL, ?8, ?8)",
        )
        .bind(&id)
        .bind(&new.tenant_id)
        .bind(&new.user_id)
        .bind(&new.filename)
        .bind(&new.file_type)
        .bind(new.file_size)
        .bind(new.content_length)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        Ok(Document {
            id,
            tenant_id: new.tenant_id,
            user_id: new.user_id,
            filename: new.filename,
            file_type: new.file_type,
            file_size: new.file_size,
            content_length: new.content_length,
            status: DocumentStatus::Processing,
            chunk_count: 0,
            storage_url: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, tenant_id: &str, document_id: &str) -> Result<Option<Document>, ApiError> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?1 AND tenant_id = ?2")
            .bind(document_id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::storage)?;

        Ok(row.as_ref().map(Self::row_to_document))
    }

    async fn list(
        &self,
        tenant_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>, ApiError> {
        let rows = sqlx::query(
            "SELECT * FROM documents
             WHERE tenant_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2 OFFSET ?3",
        )
        .bind(tenant_id)
        .bind(limit)
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        Ok(rows.iter().map(Self::row_to_document).collect())
    }

    async fn update_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        update: StatusUpdate,
    ) -> Result<(), ApiError> {
        let row = sqlx::query("SELECT chunk_count, content_length, storage_url FROM documents WHERE id = ?1")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::storage)?;

        let Some(row) = row else {
            return Err(ApiError::NotFound(format!(
                "document not found: {document_id}"
            )));
        };

        let chunk_count = update.chunk_count.unwrap_or_else(|| row.get("chunk_count"));
        let content_length = update
            .content_length
            .unwrap_or_else(|| row.get("content_length"));
        let storage_url: Option<String> = update.storage_url.or_else(|| row.get("storage_url"));

        sqlx::query(
            "UPDATE documents
             SET status = ?2, chunk_count = ?3, content_length = ?4, storage_url = ?5,
                 updated_at = ?6
             WHERE id = ?1",
        )
        .bind(document_id)
        .bind(status.as_str())
        .bind(chunk_count)
        .bind(content_length)
        .bind(&storage_url)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        Ok(())
    }

    async fn delete(&self, tenant_id: &str, document_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1 AND tenant_id = ?2")
            .bind(document_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self, tenant_id: &str) -> Result<TenantStats, ApiError> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'processed' THEN 1 ELSE 0 END), 0) AS processed,
                COALESCE(SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END), 0) AS processing,
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed,
                COALESCE(SUM(file_size), 0) AS total_size,
                COALESCE(SUM(chunk_count), 0) AS total_chunks
             FROM documents
             WHERE tenant_id = ?1",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        Ok(TenantStats {
            total_documents: row.get("total"),
            processed_documents: row.get("processed"),
            processing_documents: row.get("processing"),
            failed_documents: row.get("failed"),
            total_size_bytes: row.get("total_size"),
            total_chunks: row.get("total_chunks"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_registry() -> SqliteDocumentRegistry {
        let tmp = std::env::temp_dir().join(format!("docuchat-reg-test-{}.db", Uuid::new_v4()));
        SqliteDocumentRegistry::new(tmp).await.unwrap()
    }

    fn new_doc(tenant: &str, filename: &str) -> NewDocument {
        NewDocument {
            tenant_id: tenant.to_string(),
            user_id: "u1".to_string(),
            filename: filename.to_string(),
            file_type: "txt".to_string(),
            file_size: 100,
            content_length: 90,
        }
    }

    #[tokio::test]
    async fn create_get_and_tenant_scoping() {
        let registry = test_registry().await;
        let doc = registry.create(new_doc("t1", "a.txt")).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Processing);

        let found = registry.get("t1", &doc.id).await.unwrap();
        assert!(found.is_some());

        // Same id from another tenant looks identical to a missing id.
        let cross = registry.get("t2", &doc.id).await.unwrap();
        assert!(cross.is_none());
    }

    #[tokio::test]
    async fn update_status_applies_partial_fields() {
        let registry = test_registry().await;
        let doc = registry.create(new_doc("t1", "a.txt")).await.unwrap();

        registry
            .update_status(
                &doc.id,
                DocumentStatus::Processed,
                StatusUpdate {
                    chunk_count: Some(5),
                    storage_url: Some("file:///blobs/a.txt".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = registry.get("t1", &doc.id).await.unwrap().unwrap();
        assert_eq!(updated.status, DocumentStatus::Processed);
        assert_eq!(updated.chunk_count, 5);
        assert_eq!(updated.content_length, 90);
        assert_eq!(updated.storage_url.as_deref(), Some("file:///blobs/a.txt"));
    }

    #[tokio::test]
    async fn list_is_paginated_newest_first() {
        let registry = test_registry().await;
        for i in 0..3 {
            registry
                .create(new_doc("t1", &format!("doc{i}.txt")))
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        registry.create(new_doc("t2", "other.txt")).await.unwrap();

        let page = registry.list("t1", 2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].filename, "doc2.txt");

        let rest = registry.list("t1", 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn zero_limit_lists_nothing() {
        let registry = test_registry().await;
        registry.create(new_doc("t1", "a.txt")).await.unwrap();
        assert!(registry.list("t1", 0, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_aggregates_by_status() {
        let registry = test_registry().await;
        let a = registry.create(new_doc("t1", "a.txt")).await.unwrap();
        let b = registry.create(new_doc("t1", "b.txt")).await.unwrap();
        registry.create(new_doc("t1", "c.txt")).await.unwrap();

        registry
            .update_status(
                &a.id,
                DocumentStatus::Processed,
                StatusUpdate {
                    chunk_count: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        registry
            .update_status(&b.id, DocumentStatus::Failed, StatusUpdate::default())
            .await
            .unwrap();

        let stats = registry.stats("t1").await.unwrap();
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.processed_documents, 1);
        assert_eq!(stats.failed_documents, 1);
        assert_eq!(stats.processing_documents, 1);
        assert_eq!(stats.total_size_bytes, 300);
        assert_eq!(stats.total_chunks, 3);
    }

    #[tokio::test]
    async fn delete_is_tenant_scoped_and_reports_misses() {
        let registry = test_registry().await;
        let doc = registry.create(new_doc("t1", "a.txt")).await.unwrap();

        assert!(!registry.delete("t2", &doc.id).await.unwrap());
        assert!(registry.delete("t1", &doc.id).await.unwrap());
        assert!(!registry.delete("t1", &doc.id).await.unwrap());
    }
}
