use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reminder::ReminderId;
use crate::timer::{TimerMode, TimerStatus};

/// Every state change in the core produces an Event.
/// Hosts print them, log them, or forward them to a UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    /// The countdown reached zero and the mode flipped.
    TimerCompleted {
        completed: TimerMode,
        next: TimerMode,
        next_duration_secs: u64,
        alarm: bool,
        at: DateTime<Utc>,
    },
    /// State was restored from a persisted snapshot.
    TimerRestored {
        mode: TimerMode,
        remaining_secs: u64,
        is_active: bool,
        /// Seconds that passed while nothing was running.
        suspended_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TimerStatus,
        mode: TimerMode,
        remaining_secs: u64,
        total_secs: u64,
        is_active: bool,
        alarm_enabled: bool,
        work_duration_min: u32,
        break_duration_min: u32,
        at: DateTime<Utc>,
    },
    ReminderFired {
        id: ReminderId,
        title: String,
        message: String,
        /// Transient snooze copies are deleted once they fire.
        removed: bool,
        at: NaiveDateTime,
    },
    ReminderSnoozed {
        id: ReminderId,
        snooze_id: ReminderId,
        until: NaiveDateTime,
    },
    ReminderDismissed {
        id: ReminderId,
    },
    /// A ringing reminder nobody answered was stopped.
    ReminderExpired {
        id: ReminderId,
        fired_at: NaiveDateTime,
    },
}

impl Event {
    /// Short machine-friendly name, matches the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "TimerStarted",
            Event::TimerPaused { .. } => "TimerPaused",
            Event::TimerReset { .. } => "TimerReset",
            Event::TimerCompleted { .. } => "TimerCompleted",
            Event::TimerRestored { .. } => "TimerRestored",
            Event::StateSnapshot { .. } => "StateSnapshot",
            Event::ReminderFired { .. } => "ReminderFired",
            Event::ReminderSnoozed { .. } => "ReminderSnoozed",
            Event::ReminderDismissed { .. } => "ReminderDismissed",
            Event::ReminderExpired { .. } => "ReminderExpired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_tag_matches_kind() {
        let event = Event::ReminderDismissed {
            id: ReminderId::from("abc"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
        assert_eq!(json["id"], "abc");
    }
}
