use std::sync::Arc;
use std::time::Duration;

use holdmap_core::types::now_millis;
use tokio_util::sync::CancellationToken;

use crate::coordinator::Coordinator;

/// Periodically drop de-duplication keys older than ten windows.
pub async fn run(coordinator: Arc<Coordinator>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Dedup purge stopping");
                break;
            }
            _ = ticker.tick() => {
                let removed = coordinator.purge_dedup(now_millis()).await;
                if removed > 0 {
                    tracing::debug!(removed, "Dedup purge: dropped stale intent keys");
                }
            }
        }
    }
}
