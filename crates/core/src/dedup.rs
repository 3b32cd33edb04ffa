//! Short-window suppression of repeated hold/release intents.
//!
//! Browser tabs can fire the same intent twice within a few milliseconds
//! (duplicated UI handlers, retries). [`Deduplicator`] remembers when each
//! intent key was last seen and drops repeats inside the window. Dropping is
//! silent: this is transport-level hygiene, not a business rejection.

use std::collections::HashMap;
use std::time::Duration;

use crate::types::EpochMillis;
use crate::unit::Unit;

/// Default suppression window (100 ms).
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(100);

/// How often the coordinator purges stale entries (5 minutes).
pub const DEFAULT_DEDUP_PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Entries are kept for this many windows before a purge drops them.
pub const DEDUP_RETENTION_WINDOWS: i64 = 10;

/// Upper bound on remembered keys between purges.
pub const DEFAULT_DEDUP_MAX_ENTRIES: usize = 10_000;

/// Composite key `(unit id, target status, holder or "none", timestamp or 0)`.
pub fn intent_key(unit: &Unit) -> String {
    format!(
        "{}-{}-{}-{}",
        unit.id,
        unit.status,
        unit.held_by.as_deref().unwrap_or("none"),
        unit.held_at.unwrap_or(0)
    )
}

#[derive(Debug)]
pub struct Deduplicator {
    seen: HashMap<String, EpochMillis>,
    window_ms: i64,
    max_entries: usize,
}

impl Deduplicator {
    pub fn new(window: Duration, max_entries: usize) -> Self {
        Self {
            seen: HashMap::new(),
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
            max_entries: max_entries.max(1),
        }
    }

    /// Returns `true` if the intent should be processed, `false` if it is a
    /// repeat of the same key inside the window.
    pub fn admit(&mut self, unit: &Unit, now: EpochMillis) -> bool {
        self.admit_key(intent_key(unit), now)
    }

    pub fn admit_key(&mut self, key: String, now: EpochMillis) -> bool {
        if let Some(&last) = self.seen.get(&key) {
            if now - last < self.window_ms {
                return false;
            }
        }

        if !self.seen.contains_key(&key) && self.seen.len() >= self.max_entries {
            self.make_room(now);
        }
        self.seen.insert(key, now);
        true
    }

    /// Drop entries older than [`DEDUP_RETENTION_WINDOWS`] windows.
    /// Returns how many entries were removed.
    pub fn purge(&mut self, now: EpochMillis) -> usize {
        let cutoff = now - self.window_ms.saturating_mul(DEDUP_RETENTION_WINDOWS);
        let before = self.seen.len();
        self.seen.retain(|_, &mut seen_at| seen_at >= cutoff);
        before - self.seen.len()
    }

    /// Size guard: purge stale entries, then evict the oldest until a slot
    /// is free.
    fn make_room(&mut self, now: EpochMillis) {
        self.purge(now);
        while self.seen.len() >= self.max_entries {
            let oldest = self
                .seen
                .iter()
                .min_by_key(|(_, &seen_at)| seen_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    self.seen.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW, DEFAULT_DEDUP_MAX_ENTRIES)
    }
}
