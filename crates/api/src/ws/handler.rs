use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use holdmap_core::protocol::{parse_client_message, ClientMessage};
use holdmap_core::types::now_millis;

use crate::coordinator::Coordinator;
use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with the coordinator and
/// served by a spawned sender task plus the receive loop below.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.coordinator))
}

/// Manage a single realtime connection after upgrade.
///
///   1. Registers the connection; the snapshot is queued before anything else.
///   2. Spawns a sender task that forwards queued frames to the sink.
///   3. Parses and dispatches inbound frames on the current task.
///   4. Releases the connection's holds on close or error.
async fn handle_socket(socket: WebSocket, coordinator: Arc<Coordinator>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "Realtime client connected");

    let mut rx = coordinator.connect(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => dispatch(&coordinator, &conn_id, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(conn_id = %conn_id, "Binary frame dropped");
            }
            Ok(Message::Ping(_)) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    let released = coordinator.disconnect(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, released = released.len(), "Realtime client disconnected");
}

/// Route one inbound text frame. Malformed frames are logged and dropped.
async fn dispatch(coordinator: &Coordinator, conn_id: &str, text: &str) {
    match parse_client_message(text) {
        Ok(ClientMessage::RequestSnapshot) => {
            coordinator.handle_snapshot_request(conn_id).await;
        }
        Ok(ClientMessage::HoldOrReleaseIntent { unit }) => {
            coordinator.handle_intent(conn_id, unit, now_millis()).await;
        }
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, error = %e, "Dropping malformed client message");
        }
    }
}
