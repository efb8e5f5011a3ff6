//! Retrieval-augmented generation core.
//!
//! - `VectorStore`: tenant- and document-scoped chunk storage with
//!   similarity search
//! - `SqliteVectorStore`: the bundled store adapter
//! - `RagEngine`: embed/store/search/answer orchestration

mod engine;
mod sqlite;
mod store;

pub use engine::{RagAnswer, RagEngine};
pub use sqlite::SqliteVectorStore;
pub use store::{ChunkRecord, SearchHit, VectorStore};
