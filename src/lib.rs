pub mod chunker;
pub mod config;
pub mod documents;
pub mod errors;
pub mod extract;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod server;
pub mod state;
