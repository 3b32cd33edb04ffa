//! Periodic expiry of stale holds.
//!
//! Every tick asks the coordinator to release holds older than the TTL.
//! Released units go out to all clients as one `holdsReleased` batch.

use std::sync::Arc;
use std::time::Duration;

use holdmap_core::types::now_millis;
use tokio_util::sync::CancellationToken;

use crate::coordinator::Coordinator;

/// Run the hold sweeper loop until `cancel` is triggered.
pub async fn run(coordinator: Arc<Coordinator>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Hold sweeper started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Hold sweeper stopping");
                break;
            }
            _ = ticker.tick() => {
                let released = coordinator.sweep_expired(now_millis()).await;
                if released.is_empty() {
                    tracing::debug!("Hold sweeper: nothing expired");
                } else {
                    tracing::info!(count = released.len(), units = ?released, "Hold sweeper: released expired holds");
                }
            }
        }
    }
}
