//! Realtime service discovery.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeStatus {
    pub status: &'static str,
    /// Port of the realtime WebSocket listener.
    pub port: u16,
    pub connected_clients: usize,
}

/// GET /api/v1/realtime
///
/// Tells clients where the realtime channel listens. The port is chosen at
/// startup and may differ from the configured one.
pub async fn realtime_status(State(state): State<AppState>) -> Json<RealtimeStatus> {
    Json(RealtimeStatus {
        status: "running",
        port: state.realtime_port,
        connected_clients: state.coordinator.connection_count().await,
    })
}
