//! Blob storage seam for raw uploaded files.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::ApiError;

/// Key -> bytes content store.
///
/// Keys are namespaced `<tenant_id>/<document_id>/<filename>`; `put`
/// never overwrites an existing key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key` and return a stable URL. Fails with
    /// `Storage` if the key already exists.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, ApiError>;

    /// Fetch the bytes for `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, ApiError>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), ApiError>;
}

/// Filesystem-backed blob store.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ApiError> {
        // Keys are server-generated, but reject traversal anyway.
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(ApiError::Storage(format!("invalid blob key: {key}")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String, ApiError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ApiError::storage)?;
        }

        // create_new enforces the no-overwrite contract atomically.
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        let file = options.open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                ApiError::Storage(format!("blob key already exists: {key}"))
            } else {
                ApiError::storage(e)
            }
        })?;

        let mut file = file;
        use tokio::io::AsyncWriteExt;
        file.write_all(bytes).await.map_err(ApiError::storage)?;
        file.flush().await.map_err(ApiError::storage)?;

        Ok(format!("file://{}", path.display()))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ApiError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ApiError::NotFound(format!("blob not found: {key}"))
            } else {
                ApiError::storage(e)
            }
        })
    }

    async fn delete(&self, key: &str) -> Result<(), ApiError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::storage(e)),
        }
    }
}
