use axum::response::{IntoResponse, Json};
use serde_json::json;

pub const STORYFORGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A handler for a simple liveness check
pub async fn status_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": STORYFORGE_VERSION }))
}

/// A handler for a readiness check
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "gateway": "ok" }))
}
