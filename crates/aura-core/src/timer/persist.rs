//! Loading and saving the timer snapshot through a [`PersistentStore`].

use super::engine::FocusTimer;
use super::snapshot::TimerSnapshot;
use crate::events::Event;
use crate::storage::PersistentStore;

/// Storage key of the timer snapshot.
pub const TIMER_KEY: &str = "timer";

impl FocusTimer {
    /// Build a timer from the stored snapshot.
    ///
    /// Missing, malformed, unreadable and stale snapshots all yield a
    /// default timer. The event is `Some` only when a snapshot was applied.
    pub fn load(store: &dyn PersistentStore, now_ms: u64, window_secs: u64) -> (Self, Option<Event>) {
        let mut timer = Self::new();
        let bytes = match store.load(TIMER_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return (timer, None),
            Err(e) => {
                tracing::warn!("failed to load timer snapshot: {e}");
                return (timer, None);
            }
        };
        let Some(snapshot) = TimerSnapshot::from_bytes(&bytes) else {
            return (timer, None);
        };
        let event = timer.rehydrate_within(&snapshot, now_ms, window_secs);
        (timer, event)
    }

    /// Serialized snapshot ready for the store or the auto-save queue.
    pub fn snapshot_bytes(&self, now_ms: u64) -> Option<Vec<u8>> {
        match self.snapshot(now_ms).to_bytes() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("failed to serialize timer snapshot: {e}");
                None
            }
        }
    }

    /// Write the snapshot now. Failures are logged; the in-memory timer is
    /// unaffected.
    pub fn persist(&self, store: &dyn PersistentStore, now_ms: u64) -> bool {
        let Some(bytes) = self.snapshot_bytes(now_ms) else {
            return false;
        };
        match store.save(TIMER_KEY, &bytes) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to persist timer snapshot: {e}");
                false
            }
        }
    }

    /// Remove the stored snapshot (after a reset).
    pub fn clear_persisted(store: &dyn PersistentStore) {
        if let Err(e) = store.remove(TIMER_KEY) {
            tracing::warn!("failed to clear timer snapshot: {e}");
        }
    }
}
