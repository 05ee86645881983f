//! Debounced save queue keyed by data type.
//!
//! Components queue the latest serialized payload for their key; the queue
//! writes everything once no new payload arrived for `debounce_ms`. Only the
//! newest payload per key is kept. The queue is owned by the application
//! context and flushed on shutdown with [`AutoSaveQueue::force_save`].

use std::collections::BTreeMap;

use super::PersistentStore;

pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct AutoSaveQueue {
    pending: BTreeMap<String, Vec<u8>>,
    debounce_ms: u64,
    /// When the pending payloads become due (epoch ms).
    deadline_ms: Option<u64>,
}

impl Default for AutoSaveQueue {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

impl AutoSaveQueue {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: BTreeMap::new(),
            debounce_ms,
            deadline_ms: None,
        }
    }

    /// Queue `payload` for `key`, replacing any pending payload for it, and
    /// push the deadline back.
    pub fn queue_save(&mut self, key: &str, payload: Vec<u8>, now_ms: u64) {
        self.pending.insert(key.to_string(), payload);
        self.deadline_ms = Some(now_ms.saturating_add(self.debounce_ms));
    }

    /// Drop the pending payload for `key`, if any.
    pub fn discard(&mut self, key: &str) -> bool {
        let removed = self.pending.remove(key).is_some();
        if self.pending.is_empty() {
            self.deadline_ms = None;
        }
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    /// Swap the pending payload for `key` without moving the deadline.
    /// Returns `false` if nothing was pending for `key`.
    pub fn replace_pending(&mut self, key: &str, payload: Vec<u8>) -> bool {
        match self.pending.get_mut(key) {
            Some(slot) => {
                *slot = payload;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_keys(&self) -> Vec<&str> {
        self.pending.keys().map(String::as_str).collect()
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        matches!(self.deadline_ms, Some(deadline) if deadline <= now_ms) && !self.is_empty()
    }

    /// Milliseconds until the queue is due, zero if already due.
    pub fn time_until_due(&self, now_ms: u64) -> Option<u64> {
        self.deadline_ms.map(|d| d.saturating_sub(now_ms))
    }

    /// Write pending payloads if the debounce period elapsed.
    ///
    /// Returns the number of keys written.
    pub fn flush_due(&mut self, store: &dyn PersistentStore, now_ms: u64) -> usize {
        if !self.is_due(now_ms) {
            return 0;
        }
        self.force_save(store)
    }

    /// Write every pending payload now.
    ///
    /// Failed writes are logged and stay queued for the next flush.
    pub fn force_save(&mut self, store: &dyn PersistentStore) -> usize {
        if self.pending.is_empty() {
            self.deadline_ms = None;
            return 0;
        }

        let mut written = 0;
        self.pending.retain(|key, payload| match store.save(key, payload) {
            Ok(()) => {
                written += 1;
                false
            }
            Err(e) => {
                tracing::warn!("auto-save of '{key}' failed: {e}");
                true
            }
        });

        if self.pending.is_empty() {
            self.deadline_ms = None;
        }
        tracing::debug!("auto-save wrote {written} key(s), {} pending", self.pending.len());
        written
    }
}
