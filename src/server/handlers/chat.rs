use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::documents::require_tenant;
use crate::errors::ApiError;
use crate::llm::ChatMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub query: String,
    pub model: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

fn default_language() -> String {
    "en".to_string()
}

pub async fn answer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ChatRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&headers)?;

    let answer = state
        .rag
        .answer(
            &tenant_id,
            &body.query,
            &body.model,
            &body.language,
            body.history,
        )
        .await?;

    Ok(Json(json!({
        "response": answer.response,
        "context_used": answer.context_used,
        "usage": answer.usage,
        "model_used": answer.model_used,
        "language": answer.language,
    })))
}

#[derive(Debug, Deserialize)]
pub struct TranslateBody {
    pub text: String,
    pub target_language: String,
}

pub async fn translate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<TranslateBody>,
) -> Result<impl IntoResponse, ApiError> {
    require_tenant(&headers)?;
    let translated = state
        .language_tools
        .translate(&body.text, &body.target_language)
        .await?;
    Ok(Json(json!({ "translated": translated })))
}

#[derive(Debug, Deserialize)]
pub struct DetectBody {
    pub text: String,
}

pub async fn detect_language(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<DetectBody>,
) -> Result<impl IntoResponse, ApiError> {
    require_tenant(&headers)?;
    let language = state.language_tools.detect_language(&body.text).await;
    Ok(Json(json!({ "language": language })))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    pub query: String,
    pub limit: Option<usize>,
}

/// PRIVILEGED: tenant-agnostic analytics search.
///
/// This route is mounted under `/internal` and must never be exposed to
/// tenant-facing traffic; the deployment fronts it with an operator-only
/// network boundary. It is the single sanctioned exception to tenant
/// scoping.
pub async fn analytics_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnalyticsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let hits = state
        .rag
        .cross_tenant_search(&params.query, params.limit.unwrap_or(10))
        .await?;
    Ok(Json(json!({ "results": hits })))
}
