use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the RAG pipeline.
///
/// Retryable causes (provider timeouts, rate limits) surface as
/// `Embedding`/`Completion`; non-retryable causes (bad input, unknown
/// model) get their own variants so callers can tell them apart.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("embedding provider error: {0}")]
    Embedding(String),
    #[error("completion provider error: {0}")]
    Completion(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Storage(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::UnsupportedModel(model) => (
                StatusCode::BAD_REQUEST,
                format!("Unsupported model: {model}"),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Extraction(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Failed to extract text: {msg}"),
            ),
            ApiError::Embedding(_) | ApiError::Completion(_) => (
                StatusCode::BAD_GATEWAY,
                "Upstream AI provider error".to_string(),
            ),
            ApiError::Storage(_) | ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        // Provider/storage details stay in the logs, never in the response body.
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!("request failed: {}", self);
        }

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
