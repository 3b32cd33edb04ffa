use axum::extract::State;
use axum::{routing::get, Json, Router};
use holdmap_core::types::Timestamp;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub started_at: Timestamp,
    pub uptime_secs: i64,
    /// Open realtime connections.
    pub connected_clients: usize,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
        connected_clients: state.coordinator.connection_count().await,
    })
}

/// Mount health check routes (root-level, on both listeners).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
