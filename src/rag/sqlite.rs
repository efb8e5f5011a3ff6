//! SQLite-backed vector store adapter.
//!
//! Embeddings live as little-endian f32 blobs next to their scalar
//! filter fields; search is brute-force cosine similarity over the
//! tenant's rows. Swapping in a dedicated vector database only requires
//! another `VectorStore` implementation.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkRecord, SearchHit, VectorStore};
use crate::errors::ApiError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
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

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS document_chunks (
                chunk_id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT DEFAULT '{}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunks_tenant ON document_chunks(tenant_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunks_document
             ON document_chunks(tenant_id, document_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    fn row_to_hit(row: &sqlx::sqlite::SqliteRow, similarity: f32) -> SearchHit {
        let metadata_str: String = row.get("metadata");
        let metadata = serde_json::from_str::<Value>(&metadata_str).unwrap_or(Value::Null);

        SearchHit {
            content: row.get("content"),
            similarity,
            tenant_id: row.get("tenant_id"),
            document_id: row.get("document_id"),
            metadata,
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn insert_many(&self, records: Vec<(ChunkRecord, Vec<f32>)>) -> Result<(), ApiError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::storage)?;

        for (record, embedding) in &records {
            let blob = Self::serialize_embedding(embedding);
            let metadata_str =
                serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".to_string());

            sqlx::query(
                "INSERT OR REPLACE INTO document_chunks
                 (chunk_id, tenant_id, document_id, chunk_index, content, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&record.id)
            .bind(&record.tenant_id)
            .bind(&record.document_id)
            .bind(record.chunk_index)
            .bind(&record.content)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::storage)?;
        }

        tx.commit().await.map_err(ApiError::storage)?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        tenant_id: Option<&str>,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let rows = if let Some(tenant_id) = tenant_id {
            sqlx::query(
                "SELECT tenant_id, document_id, content, metadata, embedding
                 FROM document_chunks
                 WHERE tenant_id = ?1",
            )
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::storage)?
        } else {
            sqlx::query(
                "SELECT tenant_id, document_id, content, metadata, embedding
                 FROM document_chunks",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::storage)?
        };

        let mut scored: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let similarity = Self::cosine_similarity(query_embedding, &stored);
                Self::row_to_hit(row, similarity)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn delete_document(
        &self,
        tenant_id: &str,
        document_id: &str,
    ) -> Result<usize, ApiError> {
        let result = sqlx::query(
            "DELETE FROM document_chunks WHERE tenant_id = ?1 AND document_id = ?2",
        )
        .bind(tenant_id)
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::storage)?;

        Ok(result.rows_affected() as usize)
    }

    async fn count(
        &self,
        tenant_id: &str,
        document_id: Option<&str>,
    ) -> Result<usize, ApiError> {
        let count: i64 = if let Some(document_id) = document_id {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM document_chunks WHERE tenant_id = ?1 AND document_id = ?2",
            )
            .bind(tenant_id)
            .bind(document_id)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::storage)?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks WHERE tenant_id = ?1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::storage)?
        };

        Ok(count as usize)
    }
}
