use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, documents, health};
use crate::state::AppState;

/// Main application router.
///
/// Tenant-facing routes live under `/api` and require the tenant
/// header. `/internal` routes bypass tenant scoping and must only be
/// reachable from the operator network.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/status", get(health::status))
        .route(
            "/api/documents",
            get(documents::list).post(documents::upload),
        )
        .route("/api/documents/stats", get(documents::stats))
        .route(
            "/api/documents/:document_id",
            get(documents::get).delete(documents::delete),
        )
        .route(
            "/api/documents/:document_id/reprocess",
            post(documents::reprocess),
        )
        .route("/api/chat", post(chat::answer))
        .route("/api/translate", post(chat::translate))
        .route("/api/detect-language", post(chat::detect_language))
        .route("/internal/analytics/search", get(chat::analytics_search))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
