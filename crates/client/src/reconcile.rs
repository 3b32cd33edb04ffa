//! Client-side merge of unit status.
//!
//! Three inputs meet here:
//!
//! * authoritative units from the rental system's matrix,
//! * server-confirmed holds (snapshots and deltas from the coordinator),
//! * this tab's optimistic holds, placed on click before the server has
//!   seen them.
//!
//! Precedence per unit, highest first:
//!
//! 1. authoritative `booked` / `unavailable` (and `some-available` under
//!    [`PartialPolicy::Authoritative`]); a local hold on such a unit is
//!    discarded,
//! 2. a hold by this user, optimistic or confirmed,
//! 3. a confirmed hold by someone else,
//! 4. the authoritative `available` / `some-available` status.
//!
//! The engine does no I/O. The booking session feeds it events and sends
//! the intents it returns.

use std::collections::HashMap;

use holdmap_core::protocol::{HoldSnapshot, ReleasedUnit};
use holdmap_core::types::{EpochMillis, UnitId};
use holdmap_core::unit::{MatrixKind, Unit, UnitStatus};
use indexmap::IndexMap;

/// How `some-available` units are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartialPolicy {
    /// Partially booked units can still be held.
    #[default]
    Holdable,
    /// Partially booked units are closed, like booked ones.
    Authoritative,
}

/// Merged state of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitView {
    /// Authoritatively closed; never holdable.
    Closed(UnitStatus),
    /// Held by this user.
    Mine,
    HeldByOther { holder: String },
    Open,
    Partial,
}

/// A unit ready for drawing: `unit` carries the merged status and holder.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedUnit {
    pub unit: Unit,
    pub view: UnitView,
}

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Another user's hold was accepted first.
    HoldLost { unit_id: UnitId, holder: String },
    /// A hold from before the last reconnect no longer exists on the server.
    HoldNotConfirmed { unit_id: UnitId },
    /// The server released this user's hold (expiry).
    HoldReleased { unit_id: UnitId },
    /// The rental system closed a unit this user was holding.
    UnitClosed { unit_id: UnitId, status: UnitStatus },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Send this unit as a hold intent.
    Hold(Unit),
    /// Send this unit as a release intent; status is the pre-hold one.
    Release(Unit),
    Blocked(BlockReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    HeldByOther(String),
    Booked,
    Unavailable,
    PartiallyBooked,
    /// The unit is not on the current matrix.
    Unknown,
}

#[derive(Debug, Clone)]
struct ConfirmedHold {
    holder: String,
    held_at: EpochMillis,
}

#[derive(Debug, Clone)]
struct LocalHold {
    held_at: EpochMillis,
    /// Connection epoch the hold was placed in.
    epoch: u64,
}

#[derive(Debug)]
pub struct ReconcileEngine {
    identity: String,
    policy: PartialPolicy,
    kind: MatrixKind,
    authoritative: IndexMap<UnitId, Unit>,
    confirmed: HashMap<UnitId, ConfirmedHold>,
    optimistic: HashMap<UnitId, LocalHold>,
    epoch: u64,
}

impl ReconcileEngine {
    pub fn new(identity: impl Into<String>, policy: PartialPolicy) -> Self {
        Self {
            identity: identity.into(),
            policy,
            kind: MatrixKind::Monthly,
            authoritative: IndexMap::new(),
            confirmed: HashMap::new(),
            optimistic: HashMap::new(),
            epoch: 0,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn kind(&self) -> MatrixKind {
        self.kind
    }

    pub fn policy(&self) -> PartialPolicy {
        self.policy
    }

    /// Start a new connection epoch. Holds placed before it are dropped by
    /// the next snapshot unless the server still has them.
    pub fn on_connected(&mut self) {
        self.epoch += 1;
    }

    fn is_closed(&self, status: UnitStatus) -> bool {
        status.is_closed()
            || (status == UnitStatus::SomeAvailable && self.policy == PartialPolicy::Authoritative)
    }

    fn is_mine(&self, unit_id: &str) -> bool {
        self.optimistic.contains_key(unit_id)
            || self
                .confirmed
                .get(unit_id)
                .is_some_and(|hold| hold.holder == self.identity)
    }

    fn view_of(&self, unit: &Unit) -> UnitView {
        if self.is_closed(unit.status) {
            return UnitView::Closed(unit.status);
        }
        if self.is_mine(&unit.id) {
            return UnitView::Mine;
        }
        if let Some(hold) = self.confirmed.get(&unit.id) {
            return UnitView::HeldByOther {
                holder: hold.holder.clone(),
            };
        }
        match unit.status {
            UnitStatus::SomeAvailable => UnitView::Partial,
            _ => UnitView::Open,
        }
    }

    fn drop_mine(&mut self, unit_id: &str) -> bool {
        let local = self.optimistic.remove(unit_id).is_some();
        let confirmed = match self.confirmed.get(unit_id) {
            Some(hold) if hold.holder == self.identity => self.confirmed.remove(unit_id).is_some(),
            _ => false,
        };
        local || confirmed
    }

    fn sorted_optimistic(&self) -> Vec<UnitId> {
        let mut ids: Vec<UnitId> = self.optimistic.keys().cloned().collect();
        ids.sort();
        ids
    }

    // -----------------------------------------------------------------------
    // Inputs
    // -----------------------------------------------------------------------

    /// Replace the authoritative units with a fresh matrix.
    ///
    /// Local holds on units the matrix now reports closed are discarded.
    pub fn apply_matrix(&mut self, units: Vec<Unit>, kind: MatrixKind) -> Vec<Notice> {
        self.kind = kind;
        self.authoritative = units.into_iter().map(|u| (u.id.clone(), u)).collect();

        let mut notices = Vec::new();
        for unit_id in self.sorted_optimistic() {
            let status = match self.authoritative.get(&unit_id) {
                Some(unit) if self.is_closed(unit.status) => unit.status,
                _ => continue,
            };
            self.drop_mine(&unit_id);
            notices.push(Notice::UnitClosed { unit_id, status });
        }
        notices
    }

    /// Replace the confirmed holds with a server snapshot.
    pub fn apply_snapshot(&mut self, holds: Vec<HoldSnapshot>) -> Vec<Notice> {
        self.confirmed = holds
            .into_iter()
            .map(|h| {
                (
                    h.unit_id,
                    ConfirmedHold {
                        holder: h.holder_identity,
                        held_at: h.held_at,
                    },
                )
            })
            .collect();

        let mut notices = Vec::new();
        for unit_id in self.sorted_optimistic() {
            let stale = self
                .optimistic
                .get(&unit_id)
                .is_some_and(|local| local.epoch < self.epoch);
            match self.confirmed.get(&unit_id) {
                Some(hold) if hold.holder == self.identity => {}
                Some(hold) => {
                    let holder = hold.holder.clone();
                    self.optimistic.remove(&unit_id);
                    notices.push(Notice::HoldLost { unit_id, holder });
                }
                // Not yet processed by the server on this connection.
                None if !stale => {}
                None => {
                    self.optimistic.remove(&unit_id);
                    notices.push(Notice::HoldNotConfirmed { unit_id });
                }
            }
        }
        notices
    }

    /// Apply a hold or release made by another connection.
    pub fn apply_unit_update(&mut self, unit: Unit) -> Vec<Notice> {
        let mut notices = Vec::new();

        if unit.is_pending() {
            let holder = unit.held_by.clone().unwrap_or_default();
            if holder != self.identity && self.optimistic.remove(&unit.id).is_some() {
                notices.push(Notice::HoldLost {
                    unit_id: unit.id.clone(),
                    holder: holder.clone(),
                });
            }
            self.confirmed.insert(
                unit.id,
                ConfirmedHold {
                    holder,
                    held_at: unit.held_at.unwrap_or_default(),
                },
            );
            return notices;
        }

        self.confirmed.remove(&unit.id);
        if unit.status.is_closed() {
            if let Some(known) = self.authoritative.get_mut(&unit.id) {
                known.status = unit.status;
            }
            if self.optimistic.remove(&unit.id).is_some() {
                notices.push(Notice::UnitClosed {
                    unit_id: unit.id,
                    status: unit.status,
                });
            }
        }
        notices
    }

    /// Apply a `holdsReleased` batch. Units known to be closed are ignored.
    pub fn apply_released(&mut self, units: Vec<ReleasedUnit>) -> Vec<Notice> {
        let mut notices = Vec::new();
        for released in units {
            let closed = self
                .authoritative
                .get(&released.unit_id)
                .is_some_and(|unit| self.is_closed(unit.status));
            if closed {
                continue;
            }
            let mine = self.is_mine(&released.unit_id);
            self.confirmed.remove(&released.unit_id);
            self.optimistic.remove(&released.unit_id);
            if mine {
                notices.push(Notice::HoldReleased {
                    unit_id: released.unit_id,
                });
            }
        }
        notices
    }

    // -----------------------------------------------------------------------
    // User actions
    // -----------------------------------------------------------------------

    /// Toggle this user's hold on `unit_id`.
    pub fn click(&mut self, unit_id: &str, now: EpochMillis) -> ClickOutcome {
        let Some(unit) = self.authoritative.get(unit_id).cloned() else {
            return ClickOutcome::Blocked(BlockReason::Unknown);
        };

        match self.view_of(&unit) {
            UnitView::Closed(UnitStatus::Booked) => ClickOutcome::Blocked(BlockReason::Booked),
            UnitView::Closed(UnitStatus::SomeAvailable) => {
                ClickOutcome::Blocked(BlockReason::PartiallyBooked)
            }
            UnitView::Closed(_) => ClickOutcome::Blocked(BlockReason::Unavailable),
            UnitView::HeldByOther { holder } => {
                ClickOutcome::Blocked(BlockReason::HeldByOther(holder))
            }
            UnitView::Mine => {
                self.drop_mine(unit_id);
                ClickOutcome::Release(unit.released(unit.status))
            }
            UnitView::Open | UnitView::Partial => {
                self.optimistic.insert(
                    unit.id.clone(),
                    LocalHold {
                        held_at: now,
                        epoch: self.epoch,
                    },
                );
                ClickOutcome::Hold(unit.held(self.identity.clone(), now))
            }
        }
    }

    /// Forget a local hold whose intent could not be sent.
    pub fn discard_optimistic(&mut self, unit_id: &str) -> bool {
        self.optimistic.remove(unit_id).is_some()
    }

    /// Drop every hold of this user on the current matrix and return the
    /// units (with their authoritative status).
    pub fn clear_selection(&mut self) -> Vec<Unit> {
        let selection = self.selection();
        for unit in &selection {
            self.drop_mine(&unit.id);
        }
        selection
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Merged view of a unit on the current matrix.
    pub fn view(&self, unit_id: &str) -> Option<UnitView> {
        self.authoritative.get(unit_id).map(|unit| self.view_of(unit))
    }

    /// Units held by this user, in matrix order.
    pub fn selection(&self) -> Vec<Unit> {
        self.authoritative
            .values()
            .filter(|unit| self.view_of(unit) == UnitView::Mine)
            .cloned()
            .collect()
    }

    /// Every matrix unit with its merged status, in matrix order.
    ///
    /// Holds on units outside the matrix are kept but not rendered.
    pub fn render(&self) -> Vec<RenderedUnit> {
        self.authoritative
            .values()
            .map(|unit| {
                let view = self.view_of(unit);
                let unit = match &view {
                    UnitView::Mine => {
                        let held_at = self
                            .optimistic
                            .get(&unit.id)
                            .map(|local| local.held_at)
                            .or_else(|| self.confirmed.get(&unit.id).map(|hold| hold.held_at))
                            .unwrap_or_default();
                        unit.held(self.identity.clone(), held_at)
                    }
                    UnitView::HeldByOther { holder } => {
                        let held_at = self
                            .confirmed
                            .get(&unit.id)
                            .map(|hold| hold.held_at)
                            .unwrap_or_default();
                        unit.held(holder.clone(), held_at)
                    }
                    _ => unit.clone(),
                };
                RenderedUnit { unit, view }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
