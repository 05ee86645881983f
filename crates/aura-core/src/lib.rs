//! # Aura Focus Core Library
//!
//! This library provides the core logic of the Aura Focus productivity
//! app: a persistent work/break focus timer and a reminder scheduler.
//! Everything runs from the standalone `aura` CLI; any GUI is a thin layer
//! over the same core.
//!
//! ## Architecture
//!
//! - **Timer**: A wall-clock-based state machine; the caller invokes
//!   `tick()` periodically and the timer compensates for late ticks
//! - **Reminders**: Daily, weekly and one-time reminders evaluated against
//!   local wall-clock time, with snooze
//! - **Storage**: SQLite key-value store, session history, debounced
//!   auto-save and TOML-based configuration
//! - **Runtime**: The application context and its cancellable tick, poll
//!   and auto-save loops
//!
//! ## Key Components
//!
//! - [`FocusTimer`]: Timer state machine
//! - [`ReminderScheduler`]: Reminder list and due-evaluation
//! - [`App`]: Application context owning both
//! - [`SqliteStore`]: Persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod reminder;
pub mod runtime;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, NotifyError, StorageError, ValidationError};
pub use events::Event;
pub use notify::{deliver, AlarmHandle, MemoryNotifier, Notifier};
pub use reminder::{
    ReminderCategory, ReminderDefinition, ReminderId, ReminderScheduler, ScheduleKind, TimeOfDay,
    WeekdaySet,
};
pub use runtime::{App, ScheduledTask};
pub use storage::{AutoSaveQueue, Config, MemoryStore, PersistentStore, SqliteStore};
pub use timer::{FocusTimer, TimerMode, TimerSnapshot, TimerStatus};
