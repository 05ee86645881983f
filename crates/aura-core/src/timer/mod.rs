mod engine;
mod mode;
mod persist;
mod snapshot;

pub use engine::{
    FocusTimer, DEFAULT_BREAK_MINUTES, DEFAULT_WORK_MINUTES, MAX_DURATION_MINUTES,
    RESTORE_WINDOW_SECS,
};
pub use mode::{TimerMode, TimerStatus};
pub use persist::TIMER_KEY;
pub use snapshot::TimerSnapshot;
