pub mod health;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree served by the main HTTP listener.
///
/// ```text
/// /realtime                 realtime port discovery
/// /holds                    list active holds
/// /holds/{unit_id}          one hold, 404 if none
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/realtime", get(handlers::realtime::realtime_status))
        .route("/holds", get(handlers::holds::list_holds))
        .route("/holds/{unit_id}", get(handlers::holds::get_hold))
}

/// Routes served by the realtime listener.
///
/// ```text
/// /ws                       WebSocket upgrade
/// /health                   health check
/// ```
pub fn realtime_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(health::router())
}
