//! Notification collaborator.
//!
//! The timer and the scheduler only talk to a [`Notifier`]. Desktop hosts
//! back it with system notifications and an audio device; headless hosts
//! use [`MemoryNotifier`]. When the primary channel fails (permission denied,
//! no notification daemon) [`deliver`] falls back to the in-app toast.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::NotifyError;

/// Handle to a (possibly looping) alarm sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlarmHandle(pub u64);

pub trait Notifier: Send + Sync {
    /// Show a notification through the primary channel.
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;

    /// Low-priority in-app alert. Must not fail.
    fn toast(&self, title: &str, body: &str) {
        tracing::info!(target: "aura::toast", "{title}: {body}");
    }

    /// Start the alarm sound. `None` when the host cannot play audio.
    fn play_alarm_sound(&self) -> Option<AlarmHandle> {
        None
    }

    /// Stop a sound started by [`Notifier::play_alarm_sound`].
    fn stop(&self, _handle: AlarmHandle) {}
}

/// Notify through the primary channel, falling back to a toast.
///
/// Returns `true` when the primary channel delivered the notification.
pub fn deliver(notifier: &dyn Notifier, title: &str, body: &str) -> bool {
    match notifier.notify(title, body) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("notification failed ({e}), falling back to toast");
            notifier.toast(title, body);
            false
        }
    }
}

/// A single recorded notifier call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Notification { title: String, body: String },
    Toast { title: String, body: String },
    SoundStarted(AlarmHandle),
    SoundStopped(AlarmHandle),
}

/// Notifier that records every call in memory.
///
/// Can be told to refuse notifications to exercise the toast fallback.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    next_handle: AtomicU64,
    deny: Option<NotifyError>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose primary channel always fails with `error`.
    pub fn denying(error: NotifyError) -> Self {
        Self {
            deny: Some(error),
            ..Self::default()
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.lock().clone()
    }

    /// Titles of notifications and toasts, in order.
    pub fn titles(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Notification { title, .. } | Delivery::Toast { title, .. } => {
                    Some(title.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn notification_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| matches!(d, Delivery::Notification { .. }))
            .count()
    }

    pub fn toast_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| matches!(d, Delivery::Toast { .. }))
            .count()
    }

    /// Sounds started and not yet stopped.
    pub fn playing(&self) -> Vec<AlarmHandle> {
        let deliveries = self.lock();
        let mut playing = Vec::new();
        for d in deliveries.iter() {
            match d {
                Delivery::SoundStarted(h) => playing.push(*h),
                Delivery::SoundStopped(h) => playing.retain(|p| p != h),
                _ => {}
            }
        }
        playing
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Delivery>> {
        self.deliveries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        if let Some(err) = &self.deny {
            return Err(err.clone());
        }
        self.lock().push(Delivery::Notification {
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    fn toast(&self, title: &str, body: &str) {
        self.lock().push(Delivery::Toast {
            title: title.to_string(),
            body: body.to_string(),
        });
    }

    fn play_alarm_sound(&self) -> Option<AlarmHandle> {
        let handle = AlarmHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.lock().push(Delivery::SoundStarted(handle));
        Some(handle)
    }

    fn stop(&self, handle: AlarmHandle) {
        self.lock().push(Delivery::SoundStopped(handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deliver_uses_primary_channel() {
        let notifier = MemoryNotifier::new();
        assert!(deliver(&notifier, "Stand up", "Stretch a bit"));
        assert_eq!(notifier.notification_count(), 1);
        assert_eq!(notifier.toast_count(), 0);
    }

    #[test]
    fn deliver_falls_back_to_toast_when_denied() {
        let notifier = MemoryNotifier::denying(NotifyError::PermissionDenied);
        assert!(!deliver(&notifier, "Stand up", "Stretch a bit"));
        assert_eq!(notifier.notification_count(), 0);
        assert_eq!(notifier.toast_count(), 1);
        assert_eq!(notifier.titles(), vec!["Stand up".to_string()]);
    }

    #[test]
    fn playing_tracks_started_and_stopped_sounds() {
        let notifier = MemoryNotifier::new();
        let a = notifier.play_alarm_sound().unwrap();
        let b = notifier.play_alarm_sound().unwrap();
        assert_ne!(a, b);
        notifier.stop(a);
        assert_eq!(notifier.playing(), vec![b]);
    }
}
