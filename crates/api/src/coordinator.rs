//! Realtime hold coordinator.
//!
//! Owns the lock registry, session tracker and intent de-duplicator behind a
//! single async mutex. Every mutation and the enqueue of its resulting
//! broadcast happen while that mutex is held, so all connections observe
//! holds and releases in processing order, and a new connection's snapshot
//! is always queued ahead of any delta it can see.
//!
//! Lock order is coordinator state, then the [`WsManager`] map. The manager
//! never calls back into the coordinator.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use holdmap_core::dedup::Deduplicator;
use holdmap_core::protocol::{HoldSnapshot, ServerMessage};
use holdmap_core::registry::{Hold, HoldOutcome, LockRegistry, Rejection};
use holdmap_core::sessions::SessionTracker;
use holdmap_core::sweep;
use holdmap_core::types::{EpochMillis, UnitId};
use holdmap_core::unit::Unit;
use tokio::sync::{mpsc, Mutex};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// What [`Coordinator::handle_intent`] did with an intent.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentOutcome {
    /// Same intent seen inside the de-duplication window; dropped.
    Duplicate,
    /// The hold was placed (or renewed) and broadcast.
    Held(Hold),
    /// Another holder owns the unit. Only the sender is told who.
    Rejected(Rejection),
    /// The sender's hold was released and broadcast.
    Released,
    /// Release of a hold the sender does not own. Nothing broadcast.
    Ignored,
}

struct CoordinatorState {
    registry: LockRegistry,
    sessions: SessionTracker,
    dedup: Deduplicator,
}

pub struct Coordinator {
    state: Mutex<CoordinatorState>,
    ws_manager: Arc<WsManager>,
}

impl Coordinator {
    pub fn new(
        ws_manager: Arc<WsManager>,
        hold_ttl: Duration,
        dedup_window: Duration,
        dedup_max_entries: usize,
    ) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                registry: LockRegistry::new(hold_ttl),
                sessions: SessionTracker::new(),
                dedup: Deduplicator::new(dedup_window, dedup_max_entries),
            }),
            ws_manager,
        }
    }

    pub fn from_config(ws_manager: Arc<WsManager>, config: &ServerConfig) -> Self {
        Self::new(
            ws_manager,
            config.hold_ttl,
            config.dedup_window,
            config.dedup_max_entries,
        )
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Register a connection and queue the current snapshot to it.
    ///
    /// Returns the receiver the socket's send loop drains.
    pub async fn connect(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let mut state = self.state.lock().await;

        let rx = self.ws_manager.add(conn_id.clone()).await;
        state.sessions.open(&conn_id);

        let holds = state.registry.snapshot();
        let count = holds.len();
        if let Some(frame) = encode(&ServerMessage::Snapshot { holds }) {
            self.ws_manager.send_to(&conn_id, frame).await;
        }
        tracing::debug!(conn_id = %conn_id, count, "Snapshot queued for new connection");
        rx
    }

    /// Drop a connection and release every hold it owned.
    ///
    /// Remaining connections get one `holdsReleased` batch. Returns the
    /// released unit ids.
    pub async fn disconnect(&self, conn_id: &str) -> Vec<UnitId> {
        let mut state = self.state.lock().await;

        self.ws_manager.remove(conn_id).await;
        let mut owned = state.sessions.close(conn_id);
        owned.extend(state.registry.holds_owned_by(conn_id));
        let released: Vec<UnitId> = owned
            .into_iter()
            .filter(|unit_id| state.registry.release(unit_id, conn_id))
            .collect();

        if !released.is_empty() {
            tracing::info!(
                conn_id = %conn_id,
                count = released.len(),
                "Releasing holds of disconnected client"
            );
            if let Some(frame) = encode(&ServerMessage::released(released.clone())) {
                self.ws_manager.fan_out(frame, None).await;
            }
        }
        released
    }

    // -----------------------------------------------------------------------
    // Client messages
    // -----------------------------------------------------------------------

    /// Apply a hold (`status = pending`) or release intent from `conn_id`.
    ///
    /// Accepted changes are broadcast to every other connection with the
    /// server's `heldAt`. A rejected hold is answered, to the sender only,
    /// with a `unitUpdated` carrying the winning hold so its optimistic
    /// state rolls back. Foreign releases are silent.
    pub async fn handle_intent(
        &self,
        conn_id: &str,
        unit: Unit,
        now: EpochMillis,
    ) -> IntentOutcome {
        let mut state = self.state.lock().await;

        if !state.dedup.admit(&unit, now) {
            tracing::debug!(conn_id = %conn_id, unit_id = %unit.id, "Duplicate intent dropped");
            return IntentOutcome::Duplicate;
        }

        if unit.is_pending() {
            let holder = unit.held_by.clone().unwrap_or_default();
            let outcome = state.registry.try_hold(&unit.id, &holder, conn_id, now);
            let hold = match outcome {
                HoldOutcome::Created(hold) => hold,
                HoldOutcome::Renewed {
                    hold,
                    previous_owner,
                } => {
                    if previous_owner != conn_id {
                        state.sessions.relinquish(&previous_owner, &hold.unit_id);
                    }
                    hold
                }
                HoldOutcome::Rejected(rejection) => {
                    tracing::debug!(
                        conn_id = %conn_id,
                        unit_id = %unit.id,
                        holder = %holder,
                        held_by = %rejection.holder,
                        "Hold rejected"
                    );
                    let current = ServerMessage::UnitUpdated {
                        unit: unit.held(rejection.holder.clone(), rejection.held_at),
                    };
                    if let Some(frame) = encode(&current) {
                        self.ws_manager.send_to(conn_id, frame).await;
                    }
                    return IntentOutcome::Rejected(rejection);
                }
            };

            state.sessions.claim(conn_id, &hold.unit_id);
            tracing::info!(conn_id = %conn_id, unit_id = %hold.unit_id, holder = %holder, "Unit held");

            let update = ServerMessage::UnitUpdated {
                unit: unit.held(holder, hold.held_at),
            };
            if let Some(frame) = encode(&update) {
                self.ws_manager.fan_out(frame, Some(conn_id)).await;
            }
            return IntentOutcome::Held(hold);
        }

        if !state.registry.release(&unit.id, conn_id) {
            tracing::debug!(conn_id = %conn_id, unit_id = %unit.id, "Release for unowned hold ignored");
            return IntentOutcome::Ignored;
        }
        state.sessions.relinquish(conn_id, &unit.id);
        tracing::info!(conn_id = %conn_id, unit_id = %unit.id, status = %unit.status, "Unit released");

        let update = ServerMessage::UnitUpdated {
            unit: unit.released(unit.status),
        };
        if let Some(frame) = encode(&update) {
            self.ws_manager.fan_out(frame, Some(conn_id)).await;
        }
        IntentOutcome::Released
    }

    /// Queue the current snapshot to `conn_id` only.
    pub async fn handle_snapshot_request(&self, conn_id: &str) {
        let state = self.state.lock().await;
        let holds = state.registry.snapshot();
        if let Some(frame) = encode(&ServerMessage::Snapshot { holds }) {
            if !self.ws_manager.send_to(conn_id, frame).await {
                tracing::debug!(conn_id = %conn_id, "Snapshot requested by closed connection");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Periodic maintenance
    // -----------------------------------------------------------------------

    /// Release holds older than the TTL and broadcast one batch to everyone.
    pub async fn sweep_expired(&self, now: EpochMillis) -> Vec<UnitId> {
        let mut state = self.state.lock().await;
        let CoordinatorState {
            registry, sessions, ..
        } = &mut *state;

        let released = sweep::sweep_expired(registry, sessions, now);
        if !released.is_empty() {
            if let Some(frame) = encode(&ServerMessage::released(released.clone())) {
                self.ws_manager.fan_out(frame, None).await;
            }
        }
        released
    }

    /// Drop stale de-duplication entries. Returns how many were removed.
    pub async fn purge_dedup(&self, now: EpochMillis) -> usize {
        self.state.lock().await.dedup.purge(now)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn snapshot(&self) -> Vec<HoldSnapshot> {
        self.state.lock().await.registry.snapshot()
    }

    pub async fn hold(&self, unit_id: &str) -> Option<HoldSnapshot> {
        self.state
            .lock()
            .await
            .registry
            .get(unit_id)
            .map(Hold::to_snapshot)
    }

    pub async fn connection_count(&self) -> usize {
        self.ws_manager.connection_count().await
    }
}

/// Serialise a server message into a text frame, logging failures.
fn encode(msg: &ServerMessage) -> Option<Message> {
    match msg.to_json() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode realtime message");
            None
        }
    }
}
