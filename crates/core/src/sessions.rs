//! Per-connection ownership tracking for disconnect cleanup.

use std::collections::{BTreeSet, HashMap};

use crate::types::{ConnectionId, UnitId};

/// Maps each live realtime connection to the unit ids it currently holds.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: HashMap<ConnectionId, BTreeSet<UnitId>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty owned-set for a new connection.
    pub fn open(&mut self, connection_id: &str) {
        self.sessions.entry(connection_id.to_string()).or_default();
    }

    /// Record that `connection_id` now owns the hold on `unit_id`.
    pub fn claim(&mut self, connection_id: &str, unit_id: &str) {
        self.sessions
            .entry(connection_id.to_string())
            .or_default()
            .insert(unit_id.to_string());
    }

    /// Forget `unit_id` for `connection_id`. Returns whether it was tracked.
    pub fn relinquish(&mut self, connection_id: &str, unit_id: &str) -> bool {
        self.sessions
            .get_mut(connection_id)
            .is_some_and(|owned| owned.remove(unit_id))
    }

    /// Drop the session and return everything it owned.
    pub fn close(&mut self, connection_id: &str) -> BTreeSet<UnitId> {
        self.sessions.remove(connection_id).unwrap_or_default()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_allocates_empty_set() {
        let mut tracker = SessionTracker::new();
        tracker.open("conn-1");

        assert!(tracker.close("conn-1").is_empty());
    }

    #[test]
    fn reopening_keeps_existing_claims() {
        let mut tracker = SessionTracker::new();
        tracker.claim("conn-1", "U-1");
        tracker.open("conn-1");

        let owned: Vec<UnitId> = tracker.close("conn-1").into_iter().collect();
        assert_eq!(owned, ["U-1"]);
    }

    #[test]
    fn close_returns_owned_units_and_forgets_session() {
        let mut tracker = SessionTracker::new();
        tracker.open("conn-1");
        tracker.claim("conn-1", "U-1");
        tracker.claim("conn-1", "U-2");

        let owned: Vec<UnitId> = tracker.close("conn-1").into_iter().collect();

        assert_eq!(owned, ["U-1", "U-2"]);
        assert!(tracker.close("conn-1").is_empty());
    }

    #[test]
    fn relinquish_reports_membership() {
        let mut tracker = SessionTracker::new();
        tracker.claim("conn-1", "U-1");

        assert!(tracker.relinquish("conn-1", "U-1"));
        assert!(!tracker.relinquish("conn-1", "U-1"));
        assert!(!tracker.relinquish("conn-2", "U-1"));
    }
}
