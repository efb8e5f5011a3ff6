use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{Completion, CompletionRequest};
use crate::errors::ApiError;

/// Capability interface for chat-completion backends.
///
/// Adapters translate the uniform message list into each vendor's wire
/// shape. Providers without native incremental output implement
/// `generate_stream` by sending the full response as one fragment.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider family name (e.g. "openai", "gemini").
    fn name(&self) -> &str;

    /// Non-streaming completion.
    async fn generate(
        &self,
        request: CompletionRequest,
        model_id: &str,
    ) -> Result<Completion, ApiError>;

    /// Streaming completion: a channel of content fragments.
    async fn generate_stream(
        &self,
        request: CompletionRequest,
        model_id: &str,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError>;
}

/// Turns text into a fixed-dimension vector.
///
/// Every vector in the system comes from the same embedding model, so
/// dimensionality is constant across storage and search.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError>;
}
