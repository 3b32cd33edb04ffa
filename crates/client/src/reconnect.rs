//! Backoff between realtime connection attempts.
//!
//! Delays start at [`ReconnectConfig::initial_delay`], grow by
//! [`ReconnectConfig::multiplier`] and stop at [`ReconnectConfig::max_delay`]
//! (1 s, 2 s, 4 s ... 30 s with the defaults).

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{RealtimeClient, RealtimeConnection};

#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Sequence of retry delays for one outage.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    next: Duration,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let next = config.initial_delay.min(config.max_delay);
        Self { config, next }
    }

    /// The delay to wait now; advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next;
        self.next = current.mul_f64(self.config.multiplier).min(self.config.max_delay);
        current
    }
}

/// Retry `client.connect()` with backoff until it succeeds.
///
/// Sleeps before every attempt. `None` when `cancel` fires first.
pub async fn reconnect_loop(
    client: &RealtimeClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<RealtimeConnection> {
    let mut backoff = Backoff::new(config.clone());

    for attempt in 1u32.. {
        let delay = backoff.next_delay();
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Waiting to reconnect");

        let result = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = async {
                tokio::time::sleep(delay).await;
                client.connect().await
            } => result,
        };

        match result {
            Ok(conn) => {
                tracing::info!(attempt, url = %conn.url, "Realtime channel restored");
                return Some(conn);
            }
            Err(e) => tracing::warn!(attempt, error = %e, "Reconnect attempt failed"),
        }
    }
    None
}
