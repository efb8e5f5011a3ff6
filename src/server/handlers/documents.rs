use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::documents::UploadedFile;
use crate::errors::ApiError;
use crate::state::AppState;

/// Tenant identity comes from the auth layer in front of this service;
/// here it is read pre-authenticated from a header.
pub fn require_tenant(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Validation("missing x-tenant-id header".to_string()))
}

fn user_id(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: String,
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&headers)?;
    let user = user_id(&headers);

    let file = UploadedFile {
        filename: params.filename,
        bytes: body.to_vec(),
    };

    let document = state.pipeline.ingest(file, &tenant_id, &user).await?;
    Ok(Json(json!({ "document": document })))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&headers)?;
    let documents = state
        .pipeline
        .list(
            &tenant_id,
            params.limit.unwrap_or(50),
            params.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(json!({ "documents": documents })))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&headers)?;
    let document = state
        .pipeline
        .get(&tenant_id, &document_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("document not found: {document_id}")))?;
    Ok(Json(json!({ "document": document })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&headers)?;
    state.pipeline.delete(&document_id, &tenant_id).await?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn reprocess(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&headers)?;
    let document = state.pipeline.reprocess(&document_id, &tenant_id).await?;
    Ok(Json(json!({ "document": document })))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let tenant_id = require_tenant(&headers)?;
    let stats = state.pipeline.stats(&tenant_id).await?;
    Ok(Json(json!({ "stats": stats })))
}
