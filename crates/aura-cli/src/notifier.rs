//! Terminal-backed notifier.
//!
//! Notifications go to stderr so stdout stays machine-readable; the alarm
//! is the terminal bell.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use aura_core::storage::NotificationsConfig;
use aura_core::{AlarmHandle, Notifier, NotifyError};

pub struct TerminalNotifier {
    enabled: bool,
    sound: bool,
    next_handle: AtomicU64,
}

impl TerminalNotifier {
    pub fn from_config(config: &NotificationsConfig) -> Self {
        Self {
            enabled: config.enabled,
            sound: config.sound,
            next_handle: AtomicU64::new(1),
        }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        if !self.enabled {
            return Err(NotifyError::Unavailable("notifications disabled".into()));
        }
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "[aura] {title} {body}")
            .map_err(|e| NotifyError::Unavailable(e.to_string()))
    }

    fn play_alarm_sound(&self) -> Option<AlarmHandle> {
        if !self.sound {
            return None;
        }
        let mut stderr = std::io::stderr().lock();
        // Best effort: a terminal without a bell just ignores it.
        let _ = write!(stderr, "\x07").and_then(|()| stderr.flush());
        Some(AlarmHandle(self.next_handle.fetch_add(1, Ordering::Relaxed)))
    }

    fn stop(&self, handle: AlarmHandle) {
        tracing::debug!("alarm {} stopped", handle.0);
    }
}
