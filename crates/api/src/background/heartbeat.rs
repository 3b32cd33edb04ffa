//! Keep-alive pings on the realtime channel.
//!
//! Idle sockets behind proxies get dropped; a dropped socket means the
//! server releases that tab's holds.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio_util::sync::CancellationToken;

use crate::ws::WsManager;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub async fn run(ws_manager: Arc<WsManager>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Heartbeat stopping");
                break;
            }
            _ = ticker.tick() => {
                let pinged = ws_manager.fan_out(Message::Ping(Bytes::new()), None).await;
                tracing::trace!(pinged, "Realtime heartbeat");
            }
        }
    }
}
