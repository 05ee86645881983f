//! Persisted timer snapshot.
//!
//! The JSON shape is shared with earlier releases of the app, so the old
//! field names (`timeLeft`, `selectedWorkTime`, `selectedBreakTime`) are
//! still accepted on load.

use serde::{Deserialize, Serialize};

use super::mode::TimerMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    #[serde(default, alias = "timeLeft")]
    pub remaining_seconds: u64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub mode: TimerMode,
    #[serde(default, alias = "selectedWorkTime")]
    pub work_duration_minutes: u32,
    #[serde(default, alias = "selectedBreakTime")]
    pub break_duration_minutes: u32,
    #[serde(default = "default_true")]
    pub alarm_enabled: bool,
    /// Epoch milliseconds at which the snapshot was taken.
    #[serde(default)]
    pub last_update: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl TimerSnapshot {
    /// Parse a stored snapshot. Malformed payloads count as absent.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice(bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("discarding malformed timer snapshot: {e}");
                None
            }
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Whole seconds between `last_update` and `now_ms`.
    ///
    /// `None` when the snapshot carries no timestamp. Timestamps from the
    /// future count as zero elapsed.
    pub fn age_secs(&self, now_ms: u64) -> Option<u64> {
        self.last_update
            .map(|last| now_ms.saturating_sub(last) / 1000)
    }
}
