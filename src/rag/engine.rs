//! RAG orchestration: embed-and-store, similarity retrieval, and
//! context-conditioned answer generation.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use super::store::{ChunkRecord, SearchHit, VectorStore};
use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::llm::prompt::build_system_prompt;
use crate::llm::provider::EmbeddingProvider;
use crate::llm::registry::ModelRegistry;
use crate::llm::types::{ChatMessage, CompletionRequest, Usage};

/// A generated answer plus the retrieval evidence behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub response: String,
    pub context_used: Vec<SearchHit>,
    pub usage: Usage,
    pub model_used: String,
    pub language: String,
}

/// Composes the embedding provider, vector store, and completion
/// providers into the retrieval-augmented generation pipeline.
#[derive(Clone)]
pub struct RagEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    registry: ModelRegistry,
    config: Arc<AppConfig>,
}

impl RagEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        registry: ModelRegistry,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            embedder,
            store,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Embed `chunks` in order and persist them for the document.
    ///
    /// Embeddings are obtained sequentially and writes go out in batches
    /// to bound payload size. The batch boundary is not a consistency
    /// boundary: any embedding or storage failure aborts the whole call
    /// and the caller marks the document failed. Nothing here retries,
    /// because partial embedding spend is not refundable.
    pub async fn store_chunks(
        &self,
        tenant_id: &str,
        document_id: &str,
        chunks: &[String],
        metadata: Value,
    ) -> Result<usize, ApiError> {
        let mut records = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            let embedding = self.embedder.embed(chunk).await?;

            let mut chunk_metadata = metadata.clone();
            if let Some(obj) = chunk_metadata.as_object_mut() {
                obj.insert(
                    "created_at".to_string(),
                    Value::String(Utc::now().to_rfc3339()),
                );
                obj.insert("char_length".to_string(), Value::from(chunk.len()));
            }

            records.push((
                ChunkRecord {
                    id: ChunkRecord::chunk_id(document_id, index),
                    tenant_id: tenant_id.to_string(),
                    document_id: document_id.to_string(),
                    chunk_index: index as i64,
                    content: chunk.clone(),
                    metadata: chunk_metadata,
                },
                embedding,
            ));
        }

        let total = records.len();
        let batch_size = self.config.embed_batch_size.max(1);
        let mut iter = records.into_iter();
        loop {
            let batch: Vec<_> = iter.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            self.store.insert_many(batch).await?;
        }

        tracing::info!(
            "stored {} chunks for document {} (tenant {})",
            total,
            document_id,
            tenant_id
        );
        Ok(total)
    }

    /// Retrieve the chunks most relevant to `query` within a tenant.
    ///
    /// Results below the similarity threshold are dropped; the rest come
    /// back most similar first, at most `limit` of them.
    pub async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let query_embedding = self.embedder.embed(query).await?;
        let hits = self
            .store
            .search(&query_embedding, limit, Some(tenant_id))
            .await?;

        let threshold = self.config.similarity_threshold;
        Ok(hits
            .into_iter()
            .filter(|hit| hit.similarity >= threshold)
            .collect())
    }

    /// Answer `query` with retrieved context through the selected model.
    ///
    /// The model id is resolved before any embedding work so an
    /// unsupported model costs nothing.
    pub async fn answer(
        &self,
        tenant_id: &str,
        query: &str,
        model_id: &str,
        language: &str,
        conversation_history: Vec<ChatMessage>,
    ) -> Result<RagAnswer, ApiError> {
        let provider = self.registry.resolve(model_id)?;

        let context_used = self
            .search(tenant_id, query, self.config.search_limit)
            .await?;
        let context = Self::join_context(&context_used);

        let system_prompt = build_system_prompt(&self.config, &context, language);
        let mut messages = vec![ChatMessage::system(system_prompt)];
        messages.extend(conversation_history);
        messages.push(ChatMessage::user(query));

        let completion = provider
            .generate(CompletionRequest::new(messages), model_id)
            .await?;

        Ok(RagAnswer {
            response: completion.content,
            context_used,
            usage: completion.usage,
            model_used: model_id.to_string(),
            language: language.to_string(),
        })
    }

    /// Streaming variant of [`answer`]: fragments come over a channel,
    /// the retrieved context is returned up front for display.
    pub async fn answer_stream(
        &self,
        tenant_id: &str,
        query: &str,
        model_id: &str,
        language: &str,
        conversation_history: Vec<ChatMessage>,
    ) -> Result<(Vec<SearchHit>, mpsc::Receiver<Result<String, ApiError>>), ApiError> {
        let provider = self.registry.resolve(model_id)?;

        let context_used = self
            .search(tenant_id, query, self.config.search_limit)
            .await?;
        let context = Self::join_context(&context_used);

        let system_prompt = build_system_prompt(&self.config, &context, language);
        let mut messages = vec![ChatMessage::system(system_prompt)];
        messages.extend(conversation_history);
        messages.push(ChatMessage::user(query));

        let rx = provider
            .generate_stream(CompletionRequest::new(messages), model_id)
            .await?;

        Ok((context_used, rx))
    }

    /// Remove every stored chunk of a document.
    pub async fn delete_for_document(
        &self,
        tenant_id: &str,
        document_id: &str,
    ) -> Result<usize, ApiError> {
        let removed = self.store.delete_document(tenant_id, document_id).await?;
        tracing::info!(
            "deleted {} chunks for document {} (tenant {})",
            removed,
            document_id,
            tenant_id
        );
        Ok(removed)
    }

    /// Replace the full chunk set of a document. Not a merge: the old
    /// set must be fully gone before the new one is written.
    pub async fn update_for_document(
        &self,
        tenant_id: &str,
        document_id: &str,
        chunks: &[String],
        metadata: Value,
    ) -> Result<usize, ApiError> {
        self.delete_for_document(tenant_id, document_id).await?;
        self.store_chunks(tenant_id, document_id, chunks, metadata)
            .await
    }

    /// Number of stored chunks for a tenant (or one of its documents).
    pub async fn chunk_count(
        &self,
        tenant_id: &str,
        document_id: Option<&str>,
    ) -> Result<usize, ApiError> {
        self.store.count(tenant_id, document_id).await
    }

    /// Tenant-agnostic similarity search for internal analytics.
    ///
    /// Must only be reachable from privileged callers; tenant-facing
    /// request handlers never route here.
    pub async fn cross_tenant_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let query_embedding = self.embedder.embed(query).await?;
        self.store.search(&query_embedding, limit, None).await
    }

    fn join_context(hits: &[SearchHit]) -> String {
        hits.iter()
            .map(|hit| hit.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
