//! Document ingestion pipeline.
//!
//! Drives a document through its lifecycle across three stores (registry
//! row, blob, vector chunks) without transactions. The ordering
//! discipline keeps crashes recoverable: creation goes least-dependent
//! first (registry row in `processing` -> blob -> chunks -> finalize),
//! deletion goes most-dependent first (chunks -> blob -> registry row).
//! Any mid-sequence failure pins the document to `failed`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use serde_json::json;
use tokio::sync::Mutex;

use super::blob::BlobStore;
use super::registry::{
    Document, DocumentRegistry, DocumentStatus, NewDocument, StatusUpdate, TenantStats,
};
use crate::chunker::TextChunker;
use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::extract::{FileType, TextExtractor};
use crate::rag::RagEngine;

/// An uploaded file as received from the transport layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Advisory per-document locks.
///
/// Reprocess and delete on the same document must not interleave: a
/// delete-chunks step from one racing a store-chunks step from the other
/// silently corrupts the chunk set. Different documents proceed in
/// parallel.
#[derive(Clone, Default)]
struct DocumentLocks {
    inner: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl DocumentLocks {
    fn lock_for(&self, document_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().expect("lock map poisoned");
        map.entry(document_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once callers are done with it, so the map
    /// stays bounded by in-flight documents rather than every id seen.
    /// A strong count above 1 means another task still holds or awaits
    /// the lock; the entry stays.
    fn release(&self, document_id: &str) {
        let mut map = self.inner.lock().expect("lock map poisoned");
        if map
            .get(document_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            map.remove(document_id);
        }
    }
}

/// Composes extraction, chunking, embedding storage, and the metadata
/// registry into the document lifecycle operations.
#[derive(Clone)]
pub struct DocumentPipeline {
    registry: Arc<dyn DocumentRegistry>,
    blobs: Arc<dyn BlobStore>,
    extractor: Arc<dyn TextExtractor>,
    rag: RagEngine,
    chunker: TextChunker,
    config: Arc<AppConfig>,
    locks: DocumentLocks,
}

impl DocumentPipeline {
    pub fn new(
        registry: Arc<dyn DocumentRegistry>,
        blobs: Arc<dyn BlobStore>,
        extractor: Arc<dyn TextExtractor>,
        rag: RagEngine,
        config: Arc<AppConfig>,
    ) -> Result<Self, ApiError> {
        let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;
        Ok(Self {
            registry,
            blobs,
            extractor,
            rag,
            chunker,
            config,
            locks: DocumentLocks::default(),
        })
    }

    /// Ingest an uploaded file for a tenant.
    ///
    /// Validation and extraction happen before any state is created, so
    /// a rejected upload has zero side effects. Once the registry row
    /// exists, any later failure marks the document `failed` and
    /// propagates the error.
    pub async fn ingest(
        &self,
        file: UploadedFile,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Document, ApiError> {
        let file_type = self.validate(&file)?;
        let text = self.extractor.extract(&file.bytes, file_type).await?;

        let document = self
            .registry
            .create(NewDocument {
                tenant_id: tenant_id.to_string(),
                user_id: user_id.to_string(),
                filename: file.filename.clone(),
                file_type: file_type.as_str().to_string(),
                file_size: file.size() as i64,
                content_length: text.chars().count() as i64,
            })
            .await?;

        let lock = self.locks.lock_for(&document.id);
        let result = {
            let _guard = lock.lock().await;
            self.ingest_content(&document, &file, file_type, &text)
                .await
        };
        drop(lock);
        self.locks.release(&document.id);

        match result {
            Ok(finalized) => {
                tracing::info!(
                    "document processed: {} ({} chunks, tenant {})",
                    finalized.id,
                    finalized.chunk_count,
                    tenant_id
                );
                Ok(finalized)
            }
            Err(err) => {
                self.mark_failed(&document.id).await;
                Err(err)
            }
        }
    }

    /// Blob upload + chunk storage + finalize, from an existing
    /// `processing` registry row.
    async fn ingest_content(
        &self,
        document: &Document,
        file: &UploadedFile,
        file_type: FileType,
        text: &str,
    ) -> Result<Document, ApiError> {
        let key = blob_key(&document.tenant_id, &document.id, &file.filename);
        let storage_url = self
            .blobs
            .put(&key, &file.bytes, file_type.mime_type())
            .await?;

        let chunks = self.chunker.chunk(text);
        let metadata = json!({
            "filename": file.filename,
            "file_type": file_type.as_str(),
            "storage_url": storage_url,
        });

        let chunk_count = self
            .rag
            .store_chunks(&document.tenant_id, &document.id, &chunks, metadata)
            .await?;

        self.registry
            .update_status(
                &document.id,
                DocumentStatus::Processed,
                StatusUpdate {
                    chunk_count: Some(chunk_count as i64),
                    storage_url: Some(storage_url.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let mut finalized = document.clone();
        finalized.status = DocumentStatus::Processed;
        finalized.chunk_count = chunk_count as i64;
        finalized.storage_url = Some(storage_url);
        Ok(finalized)
    }

    /// Re-run extraction and embedding for an existing document from its
    /// stored bytes.
    ///
    /// The old chunk set is deleted in full before new chunks are
    /// written. Past that point any failure leaves the document `failed`
    /// with possibly fewer chunks than before; callers must reprocess
    /// again or delete.
    pub async fn reprocess(&self, document_id: &str, tenant_id: &str) -> Result<Document, ApiError> {
        let lock = self.locks.lock_for(document_id);
        let result = {
            let _guard = lock.lock().await;
            self.reprocess_locked(document_id, tenant_id).await
        };
        drop(lock);
        self.locks.release(document_id);
        result
    }

    async fn reprocess_locked(
        &self,
        document_id: &str,
        tenant_id: &str,
    ) -> Result<Document, ApiError> {
        let document = self
            .registry
            .get(tenant_id, document_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("document not found: {document_id}")))?;

        match self.reprocess_content(&document).await {
            Ok(finalized) => {
                tracing::info!(
                    "document reprocessed: {} ({} chunks, tenant {})",
                    finalized.id,
                    finalized.chunk_count,
                    tenant_id
                );
                Ok(finalized)
            }
            Err(err) => {
                self.mark_failed(document_id).await;
                Err(err)
            }
        }
    }

    async fn reprocess_content(&self, document: &Document) -> Result<Document, ApiError> {
        let key = blob_key(&document.tenant_id, &document.id, &document.filename);
        let bytes = self.blobs.get(&key).await?;

        let file_type = FileType::from_extension(&document.file_type).ok_or_else(|| {
            ApiError::Validation(format!("unknown stored file type: {}", document.file_type))
        })?;
        let text = self.extractor.extract(&bytes, file_type).await?;

        self.registry
            .update_status(
                &document.id,
                DocumentStatus::Processing,
                StatusUpdate::default(),
            )
            .await?;

        // Old chunks must be fully gone before any new chunk is written.
        self.rag
            .delete_for_document(&document.tenant_id, &document.id)
            .await?;

        let chunks = self.chunker.chunk(&text);
        let metadata = json!({
            "filename": document.filename,
            "file_type": document.file_type,
            "storage_url": document.storage_url,
        });

        let chunk_count = self
            .rag
            .store_chunks(&document.tenant_id, &document.id, &chunks, metadata)
            .await?;

        self.registry
            .update_status(
                &document.id,
                DocumentStatus::Processed,
                StatusUpdate {
                    chunk_count: Some(chunk_count as i64),
                    content_length: Some(text.chars().count() as i64),
                    ..Default::default()
                },
            )
            .await?;

        let mut finalized = document.clone();
        finalized.status = DocumentStatus::Processed;
        finalized.chunk_count = chunk_count as i64;
        finalized.content_length = text.chars().count() as i64;
        Ok(finalized)
    }

    /// Delete a document and everything derived from it.
    ///
    /// Order is chunks -> blob -> registry row, so a crash mid-way never
    /// leaves a registry row pointing at missing chunks. Deleting an
    /// unknown (or already deleted) id is a no-op success.
    pub async fn delete(&self, document_id: &str, tenant_id: &str) -> Result<(), ApiError> {
        let lock = self.locks.lock_for(document_id);
        let result = {
            let _guard = lock.lock().await;
            self.delete_locked(document_id, tenant_id).await
        };
        drop(lock);
        self.locks.release(document_id);
        result
    }

    async fn delete_locked(&self, document_id: &str, tenant_id: &str) -> Result<(), ApiError> {
        let Some(document) = self.registry.get(tenant_id, document_id).await? else {
            return Ok(());
        };

        self.rag.delete_for_document(tenant_id, document_id).await?;

        let key = blob_key(tenant_id, document_id, &document.filename);
        self.blobs.delete(&key).await?;

        self.registry.delete(tenant_id, document_id).await?;
        tracing::info!("document deleted: {} (tenant {})", document_id, tenant_id);
        Ok(())
    }

    /// Registry-level aggregation; never touches the vector store.
    pub async fn stats(&self, tenant_id: &str) -> Result<TenantStats, ApiError> {
        self.registry.stats(tenant_id).await
    }

    /// Tenant's documents, newest first.
    pub async fn list(
        &self,
        tenant_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Document>, ApiError> {
        self.registry.list(tenant_id, limit, offset).await
    }

    pub async fn get(
        &self,
        tenant_id: &str,
        document_id: &str,
    ) -> Result<Option<Document>, ApiError> {
        self.registry.get(tenant_id, document_id).await
    }

    /// Reject bad uploads before any state exists.
    fn validate(&self, file: &UploadedFile) -> Result<FileType, ApiError> {
        if file.filename.is_empty() || file.bytes.is_empty() {
            return Err(ApiError::Validation("no file provided".to_string()));
        }

        if file.size() > self.config.max_file_size {
            return Err(ApiError::Validation(format!(
                "file size exceeds maximum limit of {} bytes",
                self.config.max_file_size
            )));
        }

        let extension = file
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if !self.config.allowed_types.iter().any(|t| t == &extension) {
            return Err(ApiError::Validation(format!(
                "file type '{}' not supported, allowed types: {}",
                extension,
                self.config.allowed_types.join(", ")
            )));
        }

        FileType::from_extension(&extension).ok_or_else(|| {
            ApiError::Validation(format!("file type '{extension}' not supported"))
        })
    }

    /// Pin a document to `failed`. Best effort on top of an error path
    /// that is already propagating; a registry failure here only logs.
    async fn mark_failed(&self, document_id: &str) {
        if let Err(err) = self
            .registry
            .update_status(document_id, DocumentStatus::Failed, StatusUpdate::default())
            .await
        {
            tracing::error!(
                "failed to mark document {} as failed: {}",
                document_id,
                err
            );
        }
    }
}

fn blob_key(tenant_id: &str, document_id: &str, filename: &str) -> String {
    format!("{tenant_id}/{document_id}/{filename}")
}
