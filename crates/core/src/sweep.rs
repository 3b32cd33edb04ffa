//! Time-based expiry of holds.
//!
//! The sweeper is the only place that turns "stale by time" into "gone".
//! It runs on a fixed interval, so a hold may be observed for up to one
//! interval past its TTL.

use std::time::Duration;

use crate::registry::LockRegistry;
use crate::sessions::SessionTracker;
use crate::types::{EpochMillis, UnitId};

/// Default sweep interval (60 seconds).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Remove every expired hold and return the released unit ids, sorted.
///
/// Expired holds are also dropped from their owner's session so that a
/// later disconnect does not report them a second time.
pub fn sweep_expired(
    registry: &mut LockRegistry,
    sessions: &mut SessionTracker,
    now: EpochMillis,
) -> Vec<UnitId> {
    registry
        .take_expired(now)
        .into_iter()
        .map(|hold| {
            sessions.relinquish(&hold.connection_id, &hold.unit_id);
            hold.unit_id
        })
        .collect()
}
