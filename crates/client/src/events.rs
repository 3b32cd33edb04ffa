//! Events emitted by the realtime adapter.

use holdmap_core::protocol::{HoldSnapshot, ReleasedUnit, ServerMessage};
use holdmap_core::unit::Unit;

/// Realtime events delivered to subscribers, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// A connection (or reconnection) was established.
    Connected,
    /// The connection dropped. The server has released this tab's holds.
    Disconnected,
    /// Full set of active holds.
    Snapshot(Vec<HoldSnapshot>),
    /// Another connection held or released a unit.
    UnitUpdated(Unit),
    /// Holds dropped by expiry or by their owner leaving.
    HoldsReleased(Vec<ReleasedUnit>),
}

impl From<ServerMessage> for RealtimeEvent {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Snapshot { holds } => Self::Snapshot(holds),
            ServerMessage::UnitUpdated { unit } => Self::UnitUpdated(unit),
            ServerMessage::HoldsReleased { units } => Self::HoldsReleased(units),
        }
    }
}
