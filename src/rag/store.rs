//! VectorStore trait — abstract interface over the vector database.
//!
//! Records carry tenant and document scope as scalar metadata; every
//! tenant-facing read/write filters on tenant_id. The access pattern and
//! consistency contract live here, the index implementation does not.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ApiError;

/// One persisted chunk record.
///
/// The id is deterministic (`<document_id>_chunk_<index>`) so a
/// reprocess that deletes-then-recreates never leaves duplicates behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub tenant_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub metadata: Value,
}

impl ChunkRecord {
    pub fn chunk_id(document_id: &str, index: usize) -> String {
        format!("{document_id}_chunk_{index}")
    }
}

/// A ranked similarity-search match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    /// Cosine similarity, higher is better.
    pub similarity: f32,
    pub tenant_id: String,
    pub document_id: String,
    pub metadata: Value,
}

/// Abstract vector storage backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert records with their embeddings. Existing ids are replaced.
    async fn insert_many(&self, records: Vec<(ChunkRecord, Vec<f32>)>) -> Result<(), ApiError>;

    /// Rank stored chunks against `query_embedding`, most similar first.
    /// `tenant_id = None` is the privileged cross-tenant analytics path.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        tenant_id: Option<&str>,
    ) -> Result<Vec<SearchHit>, ApiError>;

    /// Delete every chunk of a document. Returns the number removed.
    async fn delete_document(&self, tenant_id: &str, document_id: &str)
        -> Result<usize, ApiError>;

    /// Chunk count, optionally narrowed to one document.
    async fn count(
        &self,
        tenant_id: &str,
        document_id: Option<&str>,
    ) -> Result<usize, ApiError>;
}
