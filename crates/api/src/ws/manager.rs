use std::collections::HashMap;

use axum::extract::ws::Message;
use holdmap_core::types::ConnectionId;
use tokio::sync::{mpsc, RwLock};

/// Outbound frame queue of one realtime connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Registry of live realtime connections and their outbound queues.
///
/// Only the coordinator adds and removes entries. Sends never block: every
/// queue is unbounded and drained by the connection's own send task, so the
/// coordinator can fan out while holding its state lock.
pub struct WsManager {
    connections: RwLock<HashMap<ConnectionId, WsSender>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register `conn_id` and return the receiving end of its queue.
    pub async fn add(&self, conn_id: ConnectionId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.write().await.insert(conn_id, tx);
        rx
    }

    pub async fn remove(&self, conn_id: &str) -> bool {
        self.connections.write().await.remove(conn_id).is_some()
    }

    /// Queue `message` for one connection. `false` if it is gone.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|tx| tx.send(message).is_ok())
    }

    /// Queue `message` for every connection except `skip`.
    ///
    /// Closed queues are skipped; their receive loops clean them up. Returns
    /// how many connections the message was queued for.
    pub async fn fan_out(&self, message: Message, skip: Option<&str>) -> usize {
        let conns = self.connections.read().await;
        conns
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != skip)
            .filter(|(_, tx)| tx.send(message.clone()).is_ok())
            .count()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Queue a Close frame for every connection and forget them all.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for tx in conns.values() {
            let _ = tx.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all realtime connections");
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
