//! Per-tab realtime adapter.
//!
//! [`RealtimeAdapter`] owns one connection to the coordinator and keeps it
//! alive (connect -> pump frames -> reconnect). Inbound frames are decoded
//! into [`RealtimeEvent`]s and published on a [`tokio::sync::broadcast`]
//! channel; call [`RealtimeAdapter::subscribe`] to receive them.
//!
//! Intents are only accepted while connected. Nothing is queued across a
//! disconnect, because the server releases a connection's holds when it
//! drops.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use holdmap_core::protocol::{parse_server_message, ClientMessage};
use holdmap_core::unit::Unit;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{RealtimeClient, RealtimeConnection};
use crate::error::ClientError;
use crate::events::RealtimeEvent;
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Broadcast channel capacity for realtime events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// State shared between the adapter handle and its connection task.
struct Shared {
    /// Outbound frame queue of the live connection, `None` while down.
    outbound: RwLock<Option<mpsc::UnboundedSender<Message>>>,
    event_tx: broadcast::Sender<RealtimeEvent>,
}

pub struct RealtimeAdapter {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeAdapter {
    /// Spawn the connection task and return a shared handle.
    pub fn start(client: RealtimeClient, reconnect: ReconnectConfig) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            outbound: RwLock::new(None),
            event_tx,
        });
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_connection_loop(
            client,
            reconnect,
            Arc::clone(&shared),
            cancel.clone(),
        ));

        Arc::new(Self {
            shared,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Subscribe to realtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.shared.event_tx.subscribe()
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.outbound.read().await.is_some()
    }

    /// Send a hold (`status = pending`) or release intent for `unit`.
    pub async fn send_intent(&self, unit: Unit) -> Result<(), ClientError> {
        self.send(&ClientMessage::HoldOrReleaseIntent { unit }).await
    }

    /// Ask the server for the full set of active holds.
    pub async fn request_snapshot(&self) -> Result<(), ClientError> {
        self.send(&ClientMessage::RequestSnapshot).await
    }

    async fn send(&self, msg: &ClientMessage) -> Result<(), ClientError> {
        let json = serde_json::to_string(msg).map_err(|e| ClientError::Protocol(e.to_string()))?;
        let outbound = self.shared.outbound.read().await;
        match outbound.as_ref() {
            Some(tx) => tx
                .send(Message::Text(json))
                .map_err(|_| ClientError::NotConnected),
            None => Err(ClientError::NotConnected),
        }
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Waits up to 5 seconds for the connection task to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
        }
        tracing::info!("Realtime adapter shut down");
    }
}

/// Core connection loop: connect -> serve -> reconnect.
///
/// Runs until the cancellation token is triggered.
async fn run_connection_loop(
    client: RealtimeClient,
    reconnect: ReconnectConfig,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    loop {
        let first_attempt = tokio::select! {
            _ = cancel.cancelled() => return,
            result = client.connect() => result,
        };

        let conn = match first_attempt {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Realtime connection failed, entering reconnect loop");
                match reconnect_loop(&client, &reconnect, &cancel).await {
                    Some(conn) => conn,
                    None => return,
                }
            }
        };

        serve_connection(conn, &shared, &cancel).await;

        if cancel.is_cancelled() {
            return;
        }

        tracing::info!("Realtime connection lost, reconnecting");
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(reconnect.initial_delay) => {}
        }
    }
}

/// Pump one connection until it drops or `cancel` fires.
async fn serve_connection(conn: RealtimeConnection, shared: &Shared, cancel: &CancellationToken) {
    let (mut sink, mut stream) = conn.ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    match serde_json::to_string(&ClientMessage::RequestSnapshot) {
        Ok(json) => {
            let _ = tx.send(Message::Text(json));
        }
        Err(e) => tracing::error!(error = %e, "Failed to encode snapshot request"),
    }
    *shared.outbound.write().await = Some(tx);
    let _ = shared.event_tx.send(RealtimeEvent::Connected);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            outbound = rx.recv() => match outbound {
                Some(msg) => {
                    if let Err(e) = sink.send(msg).await {
                        tracing::debug!(error = %e, "Realtime sink closed");
                        break;
                    }
                }
                None => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => handle_text_message(&text, shared),
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Realtime channel closed by server");
                    break;
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::trace!("Ignoring binary realtime frame");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Realtime receive error");
                    break;
                }
                None => break,
            },
        }
    }

    *shared.outbound.write().await = None;
    let _ = shared.event_tx.send(RealtimeEvent::Disconnected);
}

fn handle_text_message(text: &str, shared: &Shared) {
    match parse_server_message(text) {
        Ok(msg) => {
            let _ = shared.event_tx.send(RealtimeEvent::from(msg));
        }
        Err(e) => {
            tracing::warn!(error = %e, raw_message = %text, "Failed to parse realtime message");
        }
    }
}
