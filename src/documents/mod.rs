//! Document lifecycle: registry metadata, blob storage, and the
//! ingestion pipeline that ties them to the vector store.

mod blob;
mod pipeline;
mod registry;

pub use blob::{BlobStore, FsBlobStore};
pub use pipeline::{DocumentPipeline, UploadedFile};
pub use registry::{
    Document, DocumentRegistry, DocumentStatus, NewDocument, SqliteDocumentRegistry, StatusUpdate,
    TenantStats,
};
