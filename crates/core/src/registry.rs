//! In-memory lock table for temporary unit holds.
//!
//! [`LockRegistry`] is pure data plus mutation rules: it performs no I/O and
//! holds no locks of its own. Mutations take `&mut self`, so whoever owns the
//! registry decides how concurrent callers are serialised (the coordinator
//! keeps it behind a single async mutex).
//!
//! The registry is advisory. It records who owns each hold and offers an
//! owner-checked [`release`](LockRegistry::release), but it is up to the
//! caller to route requests through the right operation.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use crate::protocol::HoldSnapshot;
use crate::types::{ConnectionId, EpochMillis, UnitId};

/// Default hold time-to-live (10 minutes).
pub const DEFAULT_HOLD_TTL: Duration = Duration::from_secs(10 * 60);

/// A temporary claim on one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hold {
    pub unit_id: UnitId,
    pub holder: String,
    pub held_at: EpochMillis,
    pub connection_id: ConnectionId,
}

impl Hold {
    pub fn age_millis(&self, now: EpochMillis) -> i64 {
        now - self.held_at
    }

    pub fn to_snapshot(&self) -> HoldSnapshot {
        HoldSnapshot {
            unit_id: self.unit_id.clone(),
            holder_identity: self.holder.clone(),
            held_at: self.held_at,
        }
    }
}

/// Result of [`LockRegistry::try_hold`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldOutcome {
    /// No hold existed; a new one was created.
    Created(Hold),
    /// An existing hold by the same holder (or an expired hold) was
    /// replaced. `previous_owner` is the connection that owned it before.
    Renewed {
        hold: Hold,
        previous_owner: ConnectionId,
    },
    Rejected(Rejection),
}

impl HoldOutcome {
    pub fn hold(&self) -> Option<&Hold> {
        match self {
            Self::Created(hold) | Self::Renewed { hold, .. } => Some(hold),
            Self::Rejected(_) => None,
        }
    }
}

/// The live hold that blocked a [`LockRegistry::try_hold`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub holder: String,
    pub held_at: EpochMillis,
}

/// Map from unit id to its single active [`Hold`].
#[derive(Debug)]
pub struct LockRegistry {
    holds: HashMap<UnitId, Hold>,
    ttl: Duration,
}

impl LockRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            holds: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    fn is_expired(&self, hold: &Hold, now: EpochMillis) -> bool {
        hold.age_millis(now) > self.ttl_millis()
    }

    /// Try to place a hold on `unit_id` for `holder`, owned by `connection_id`.
    pub fn try_hold(
        &mut self,
        unit_id: &str,
        holder: &str,
        connection_id: &str,
        now: EpochMillis,
    ) -> HoldOutcome {
        let previous_owner = match self.holds.get(unit_id) {
            Some(existing) if existing.holder != holder && !self.is_expired(existing, now) => {
                return HoldOutcome::Rejected(Rejection {
                    holder: existing.holder.clone(),
                    held_at: existing.held_at,
                });
            }
            Some(existing) => Some(existing.connection_id.clone()),
            None => None,
        };

        let hold = Hold {
            unit_id: unit_id.to_string(),
            holder: holder.to_string(),
            held_at: now,
            connection_id: connection_id.to_string(),
        };
        self.holds.insert(hold.unit_id.clone(), hold.clone());

        match previous_owner {
            Some(previous_owner) => HoldOutcome::Renewed {
                hold,
                previous_owner,
            },
            None => HoldOutcome::Created(hold),
        }
    }

    /// Remove the hold on `unit_id` only if `connection_id` owns it.
    pub fn release(&mut self, unit_id: &str, connection_id: &str) -> bool {
        match self.holds.get(unit_id) {
            Some(hold) if hold.connection_id == connection_id => {
                self.holds.remove(unit_id);
                true
            }
            _ => false,
        }
    }

    /// Remove the hold on `unit_id` regardless of owner.
    ///
    /// Reserved for expiry; everything else goes through [`release`](Self::release).
    pub fn evict(&mut self, unit_id: &str) -> Option<Hold> {
        self.holds.remove(unit_id)
    }

    pub fn get(&self, unit_id: &str) -> Option<&Hold> {
        self.holds.get(unit_id)
    }

    /// Every active hold, sorted by unit id, without connection ids.
    pub fn snapshot(&self) -> Vec<HoldSnapshot> {
        let mut entries: Vec<HoldSnapshot> = self.holds.values().map(Hold::to_snapshot).collect();
        entries.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        entries
    }

    pub fn holds_owned_by(&self, connection_id: &str) -> BTreeSet<UnitId> {
        self.holds
            .values()
            .filter(|hold| hold.connection_id == connection_id)
            .map(|hold| hold.unit_id.clone())
            .collect()
    }

    /// Remove and return every hold older than the TTL, sorted by unit id.
    pub fn take_expired(&mut self, now: EpochMillis) -> Vec<Hold> {
        let expired: Vec<UnitId> = self
            .holds
            .values()
            .filter(|hold| self.is_expired(hold, now))
            .map(|hold| hold.unit_id.clone())
            .collect();

        let mut removed: Vec<Hold> = expired
            .iter()
            .filter_map(|unit_id| self.evict(unit_id))
            .collect();
        removed.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        removed
    }

    pub fn len(&self) -> usize {
        self.holds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD_TTL)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const MINUTE: i64 = 60_000;

    #[test]
    fn first_hold_is_created() {
        let mut registry = LockRegistry::default();

        let outcome = registry.try_hold("U-101", "Tiger42", "conn-a", 1_000);

        assert_matches!(outcome, HoldOutcome::Created(hold) => {
            assert_eq!(hold.holder, "Tiger42");
            assert_eq!(hold.held_at, 1_000);
            assert_eq!(hold.connection_id, "conn-a");
        });
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn different_holder_is_rejected_while_live() {
        let mut registry = LockRegistry::default();
        registry.try_hold("U-101", "Tiger42", "conn-a", 0);

        let outcome = registry.try_hold("U-101", "Eagle9", "conn-b", MINUTE);

        assert_eq!(
            outcome,
            HoldOutcome::Rejected(Rejection {
                holder: "Tiger42".into(),
                held_at: 0,
            })
        );
        assert_eq!(registry.get("U-101").unwrap().connection_id, "conn-a");
    }

    #[test]
    fn concurrent_contenders_leave_exactly_one_hold() {
        let mut registry = LockRegistry::default();
        let contenders = ["A", "B", "C", "D", "E"];

        let winners = contenders
            .iter()
            .enumerate()
            .filter(|(i, holder)| {
                let conn = format!("conn-{i}");
                registry.try_hold("U-1", holder, &conn, 10).hold().is_some()
            })
            .count();

        assert_eq!(winners, 1);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn same_holder_renews_and_moves_ownership() {
        let mut registry = LockRegistry::default();
        registry.try_hold("U-1", "Tiger42", "tab-1", 0);

        let outcome = registry.try_hold("U-1", "Tiger42", "tab-2", 5_000);

        assert_matches!(outcome, HoldOutcome::Renewed { hold, previous_owner } => {
            assert_eq!(previous_owner, "tab-1");
            assert_eq!(hold.connection_id, "tab-2");
            assert_eq!(hold.held_at, 5_000);
        });
        assert!(!registry.release("U-1", "tab-1"));
        assert!(registry.release("U-1", "tab-2"));
    }

    #[test]
    fn expired_hold_can_be_taken_over() {
        let mut registry = LockRegistry::new(Duration::from_secs(600));
        registry.try_hold("U-1", "Wolf7", "conn-a", 0);

        let outcome = registry.try_hold("U-1", "Eagle9", "conn-b", 10 * MINUTE + 1);

        assert_matches!(outcome, HoldOutcome::Renewed { previous_owner, .. } => {
            assert_eq!(previous_owner, "conn-a");
        });
        assert_eq!(registry.get("U-1").unwrap().holder, "Eagle9");
    }

    #[test]
    fn release_by_non_owner_keeps_hold() {
        let mut registry = LockRegistry::default();
        registry.try_hold("U-1", "Tiger42", "conn-a", 0);

        assert!(!registry.release("U-1", "conn-b"));
        assert!(registry.get("U-1").is_some());

        assert!(registry.release("U-1", "conn-a"));
        assert!(registry.is_empty());
        assert!(!registry.release("U-1", "conn-a"));
    }

    #[test]
    fn snapshot_is_sorted() {
        let mut registry = LockRegistry::default();
        registry.try_hold("U-2", "B", "conn-b", 2);
        registry.try_hold("U-1", "A", "conn-a", 1);

        let snapshot = registry.snapshot();
        let ids: Vec<&str> = snapshot.iter().map(|e| e.unit_id.as_str()).collect();
        assert_eq!(ids, ["U-1", "U-2"]);
        assert_eq!(snapshot[0].holder_identity, "A");
    }

    #[test]
    fn holds_owned_by_filters_connection() {
        let mut registry = LockRegistry::default();
        registry.try_hold("U-1", "A", "conn-a", 0);
        registry.try_hold("U-2", "A", "conn-a", 0);
        registry.try_hold("U-3", "B", "conn-b", 0);

        let owned: Vec<UnitId> = registry.holds_owned_by("conn-a").into_iter().collect();
        assert_eq!(owned, ["U-1", "U-2"]);
        assert!(registry.holds_owned_by("conn-z").is_empty());
    }

    #[test]
    fn take_expired_removes_only_stale_holds() {
        let mut registry = LockRegistry::new(Duration::from_secs(600));
        registry.try_hold("U-205", "Wolf7", "conn-a", 0);
        registry.try_hold("U-206", "Fox3", "conn-b", 5 * MINUTE);

        let expired = registry.take_expired(11 * MINUTE);

        let ids: Vec<&str> = expired.iter().map(|h| h.unit_id.as_str()).collect();
        assert_eq!(ids, ["U-205"]);
        assert!(registry.get("U-206").is_some());
    }

    #[test]
    fn hold_exactly_at_ttl_survives() {
        let mut registry = LockRegistry::new(Duration::from_secs(600));
        registry.try_hold("U-1", "A", "conn-a", 0);

        assert!(registry.take_expired(10 * MINUTE).is_empty());
        assert_eq!(registry.take_expired(10 * MINUTE + 1).len(), 1);
    }

    #[test]
    fn rejected_unit_can_be_held_after_owner_releases() {
        let mut registry = LockRegistry::default();
        registry.try_hold("U-1", "A", "conn-a", 0);
        assert_matches!(registry.try_hold("U-1", "B", "conn-b", 1), HoldOutcome::Rejected(_));

        assert!(registry.release("U-1", "conn-a"));

        assert_matches!(registry.try_hold("U-1", "B", "conn-b", 2), HoldOutcome::Created(_));
    }
}
