//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;
use crate::service::SyncStatus;

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    sync: SyncStatus,
    mirrored_participants: usize,
    timestamp: String,
    version: String,
}

/// `GET /health`: Service health status.
///
/// Reports `degraded` with `503` while the store holds no connection. A
/// registry that failed to load at startup is reported through
/// `registry_seeded` without failing the check.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let sync = state.sync_service.status().await;
    let (code, status) = if sync.database_connected {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        code,
        Json(HealthResponse {
            status,
            sync,
            mirrored_participants: state.mirror.len(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
