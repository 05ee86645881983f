//! Recurring and one-time reminders.

mod definition;
mod scheduler;

pub use definition::{
    parse_reminder_document, parse_reminder_list, ReminderCategory, ReminderDefinition,
    ReminderId, ReminderRecord, ScheduleKind, TimeOfDay, WeekdaySet,
};
pub use scheduler::{
    snooze_target, ReminderScheduler, RingingAlarm, DEFAULT_FIRING_WINDOW_SECS,
    DEFAULT_RING_TIMEOUT_SECS, DEFAULT_SNOOZE_MINUTES, REMINDERS_KEY,
};
