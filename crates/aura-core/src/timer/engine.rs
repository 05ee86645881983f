//! Focus timer implementation.
//!
//! The focus timer is a wall-clock-based state machine. It does not use
//! internal threads - the caller is responsible for calling `tick()`
//! periodically (the runtime does so every second).
//!
//! ## State Transitions
//!
//! ```text
//! Idle-Work  <-start/pause->  Running-Work
//!     ^                            | zero
//!     | zero                       v
//! Running-Break <-start/pause-> Idle-Break
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = FocusTimer::new();
//! timer.start(now_ms);
//! // In a loop:
//! timer.tick(now_ms, &notifier); // Returns Some(Event) on state change
//! ```

use serde::{Deserialize, Serialize};

use super::mode::{TimerMode, TimerStatus};
use super::snapshot::TimerSnapshot;
use crate::clock::utc_from_epoch_ms;
use crate::error::ValidationError;
use crate::events::Event;
use crate::notify::{deliver, AlarmHandle, Notifier};

pub const DEFAULT_WORK_MINUTES: u32 = 25;
pub const DEFAULT_BREAK_MINUTES: u32 = 5;
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;
/// Snapshots older than this are ignored on startup.
pub const RESTORE_WINDOW_SECS: u64 = 3600;

/// Countdown timer alternating between work and break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusTimer {
    mode: TimerMode,
    /// Remaining time in seconds for the current mode.
    remaining_secs: u64,
    is_active: bool,
    work_duration_min: u32,
    break_duration_min: u32,
    alarm_enabled: bool,
    /// Wall-clock anchor of the last applied tick. Only whole seconds are
    /// consumed from it, so sub-second remainders carry over.
    #[serde(default)]
    last_tick_epoch_ms: Option<u64>,
    #[serde(skip)]
    alarm: Option<AlarmHandle>,
}

impl Default for FocusTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusTimer {
    /// Create a timer with the default 25/5 durations, idle in work mode.
    pub fn new() -> Self {
        Self {
            mode: TimerMode::Work,
            remaining_secs: minutes_to_secs(DEFAULT_WORK_MINUTES),
            is_active: false,
            work_duration_min: DEFAULT_WORK_MINUTES,
            break_duration_min: DEFAULT_BREAK_MINUTES,
            alarm_enabled: true,
            last_tick_epoch_ms: None,
            alarm: None,
        }
    }

    /// Create an idle timer with custom durations.
    pub fn with_durations(work_min: u32, break_min: u32) -> Result<Self, ValidationError> {
        validate_minutes("work_duration", work_min)?;
        validate_minutes("break_duration", break_min)?;
        let mut timer = Self::new();
        timer.work_duration_min = work_min;
        timer.break_duration_min = break_min;
        timer.remaining_secs = minutes_to_secs(work_min);
        Ok(timer)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn work_duration_min(&self) -> u32 {
        self.work_duration_min
    }

    pub fn break_duration_min(&self) -> u32 {
        self.break_duration_min
    }

    pub fn alarm_enabled(&self) -> bool {
        self.alarm_enabled
    }

    pub fn status(&self) -> TimerStatus {
        TimerStatus::from_parts(self.mode, self.is_active)
    }

    /// Configured duration of `mode`, in seconds.
    pub fn duration_secs(&self, mode: TimerMode) -> u64 {
        match mode {
            TimerMode::Work => minutes_to_secs(self.work_duration_min),
            TimerMode::Break => minutes_to_secs(self.break_duration_min),
        }
    }

    pub fn total_secs(&self) -> u64 {
        self.duration_secs(self.mode)
    }

    /// Upper bound of `remaining_secs`.
    pub fn max_secs(&self) -> u64 {
        minutes_to_secs(self.work_duration_min.max(self.break_duration_min))
    }

    /// The countdown hit zero while nothing was ticking (restored from a
    /// snapshot). The next tick flips the mode.
    pub fn is_pending_completion(&self) -> bool {
        self.remaining_secs == 0
    }

    /// 0.0 .. 1.0 progress within the current mode.
    pub fn progress(&self) -> f64 {
        let total = self.total_secs();
        if total == 0 {
            return 0.0;
        }
        (1.0 - self.remaining_secs as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// Remaining time as `MM:SS`.
    pub fn format_remaining(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.remaining_secs / 60,
            self.remaining_secs % 60
        )
    }

    /// Build the persisted snapshot. Whole seconds elapsed since the last
    /// tick are already subtracted.
    pub fn snapshot(&self, now_ms: u64) -> TimerSnapshot {
        let pending = match (self.is_active, self.last_tick_epoch_ms) {
            (true, Some(last)) => now_ms.saturating_sub(last) / 1000,
            _ => 0,
        };
        TimerSnapshot {
            remaining_seconds: self.remaining_secs.saturating_sub(pending),
            is_active: self.is_active,
            mode: self.mode,
            work_duration_minutes: self.work_duration_min,
            break_duration_minutes: self.break_duration_min,
            alarm_enabled: self.alarm_enabled,
            last_update: Some(now_ms),
        }
    }

    /// Build a full state snapshot event.
    pub fn state_event(&self, now_ms: u64) -> Event {
        Event::StateSnapshot {
            status: self.status(),
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            total_secs: self.total_secs(),
            is_active: self.is_active,
            alarm_enabled: self.alarm_enabled,
            work_duration_min: self.work_duration_min,
            break_duration_min: self.break_duration_min,
            at: utc_from_epoch_ms(now_ms),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, now_ms: u64) -> Option<Event> {
        if self.is_active {
            return None; // Already running.
        }
        self.is_active = true;
        self.last_tick_epoch_ms = Some(now_ms);
        Some(Event::TimerStarted {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            at: utc_from_epoch_ms(now_ms),
        })
    }

    /// Pause a running countdown. Time elapsed since the last tick is
    /// applied first; if that reaches zero the session completes instead.
    pub fn pause(&mut self, now_ms: u64, notifier: &dyn Notifier) -> Option<Event> {
        if !self.is_active {
            return None;
        }
        let elapsed = self.consume_elapsed(now_ms);
        self.remaining_secs = self.remaining_secs.saturating_sub(elapsed);
        if self.remaining_secs == 0 {
            return Some(self.complete(now_ms, notifier));
        }
        self.is_active = false;
        self.last_tick_epoch_ms = None;
        Some(Event::TimerPaused {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            at: utc_from_epoch_ms(now_ms),
        })
    }

    /// Start when idle, pause when running.
    pub fn toggle(&mut self, now_ms: u64, notifier: &dyn Notifier) -> Option<Event> {
        if self.is_active {
            self.pause(now_ms, notifier)
        } else {
            self.start(now_ms)
        }
    }

    /// Back to an idle work countdown. The caller clears the persisted
    /// snapshot.
    pub fn reset(&mut self, now_ms: u64) -> Event {
        self.mode = TimerMode::Work;
        self.remaining_secs = self.duration_secs(TimerMode::Work);
        self.is_active = false;
        self.last_tick_epoch_ms = None;
        Event::TimerReset {
            at: utc_from_epoch_ms(now_ms),
        }
    }

    /// Change the work duration.
    ///
    /// A running countdown keeps its remaining time; the new value applies
    /// at the next reset or mode switch. An untouched idle work countdown
    /// is updated right away.
    pub fn set_work_duration(&mut self, minutes: u32) -> Result<(), ValidationError> {
        validate_minutes("work_duration", minutes)?;
        let untouched = self.is_untouched(TimerMode::Work);
        self.work_duration_min = minutes;
        if untouched {
            self.remaining_secs = self.duration_secs(TimerMode::Work);
        }
        self.clamp_remaining();
        Ok(())
    }

    /// Change the break duration. Same rules as [`Self::set_work_duration`].
    pub fn set_break_duration(&mut self, minutes: u32) -> Result<(), ValidationError> {
        validate_minutes("break_duration", minutes)?;
        let untouched = self.is_untouched(TimerMode::Break);
        self.break_duration_min = minutes;
        if untouched {
            self.remaining_secs = self.duration_secs(TimerMode::Break);
        }
        self.clamp_remaining();
        Ok(())
    }

    pub fn set_alarm_enabled(&mut self, enabled: bool) {
        self.alarm_enabled = enabled;
    }

    /// Advance using the wall clock. Call periodically.
    ///
    /// Elapsed time is measured from the previous tick, so a delayed tick
    /// (suspended process, throttled host) is compensated rather than lost.
    pub fn tick(&mut self, now_ms: u64, notifier: &dyn Notifier) -> Option<Event> {
        let elapsed = if self.is_active {
            self.consume_elapsed(now_ms)
        } else {
            0
        };
        self.tick_elapsed(elapsed, now_ms, notifier)
    }

    /// Advance by `elapsed_secs`. Returns `Some(Event::TimerCompleted)`,
    /// stamped `now_ms`, when the countdown reaches zero.
    pub fn tick_elapsed(
        &mut self,
        elapsed_secs: u64,
        now_ms: u64,
        notifier: &dyn Notifier,
    ) -> Option<Event> {
        if self.is_active {
            self.remaining_secs = self.remaining_secs.saturating_sub(elapsed_secs);
        }
        if self.remaining_secs == 0 {
            return Some(self.complete(now_ms, notifier));
        }
        None
    }

    /// Take the handle of the alarm started by the last completion, so the
    /// host can stop it.
    pub fn take_alarm(&mut self) -> Option<AlarmHandle> {
        self.alarm.take()
    }

    /// Restore from a snapshot using the default one-hour window.
    pub fn rehydrate(&mut self, snapshot: &TimerSnapshot, now_ms: u64) -> Option<Event> {
        self.rehydrate_within(snapshot, now_ms, RESTORE_WINDOW_SECS)
    }

    /// Restore from a snapshot taken less than `window_secs` ago.
    ///
    /// Returns `None` and leaves the timer untouched when the snapshot is
    /// stale or has no timestamp. A countdown that ran out while nothing was
    /// ticking is restored as an idle zero; the next tick completes it.
    pub fn rehydrate_within(
        &mut self,
        snapshot: &TimerSnapshot,
        now_ms: u64,
        window_secs: u64,
    ) -> Option<Event> {
        let elapsed = snapshot.age_secs(now_ms)?;
        if elapsed >= window_secs {
            tracing::debug!("ignoring stale timer snapshot, {elapsed} s old");
            return None;
        }

        self.work_duration_min = sanitize_minutes(snapshot.work_duration_minutes, DEFAULT_WORK_MINUTES);
        self.break_duration_min =
            sanitize_minutes(snapshot.break_duration_minutes, DEFAULT_BREAK_MINUTES);
        self.alarm_enabled = snapshot.alarm_enabled;
        self.mode = snapshot.mode;
        let max = self.max_secs();

        let mut suspended_secs = 0;
        if snapshot.is_active && snapshot.remaining_seconds > elapsed {
            self.remaining_secs = (snapshot.remaining_seconds - elapsed).min(max);
            self.is_active = true;
            self.last_tick_epoch_ms = Some(now_ms);
            suspended_secs = elapsed;
        } else if snapshot.is_active {
            // Ran out while suspended.
            self.remaining_secs = 0;
            self.is_active = false;
            self.last_tick_epoch_ms = None;
            suspended_secs = elapsed;
        } else {
            // An idle zero is a completion that has not been applied yet.
            self.remaining_secs = snapshot.remaining_seconds.min(max);
            self.is_active = false;
            self.last_tick_epoch_ms = None;
        }

        Some(Event::TimerRestored {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            is_active: self.is_active,
            suspended_secs,
            at: utc_from_epoch_ms(now_ms),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete(&mut self, now_ms: u64, notifier: &dyn Notifier) -> Event {
        let completed = self.mode;
        let next = completed.next();
        if self.alarm_enabled {
            let (title, body) = completed.completion_message();
            deliver(notifier, title, body);
            if let Some(previous) = self.alarm.take() {
                notifier.stop(previous);
            }
            self.alarm = notifier.play_alarm_sound();
        }
        self.mode = next;
        self.remaining_secs = self.duration_secs(next);
        self.is_active = false;
        self.last_tick_epoch_ms = None;
        tracing::info!("{completed} session completed, switched to {next}");
        Event::TimerCompleted {
            completed,
            next,
            next_duration_secs: self.remaining_secs,
            alarm: self.alarm_enabled,
            at: utc_from_epoch_ms(now_ms),
        }
    }

    /// Whole seconds since the last tick; advances the anchor by exactly
    /// that many seconds.
    fn consume_elapsed(&mut self, now_ms: u64) -> u64 {
        let Some(last) = self.last_tick_epoch_ms else {
            self.last_tick_epoch_ms = Some(now_ms);
            return 0;
        };
        if now_ms < last {
            // Clock went backwards; re-anchor.
            self.last_tick_epoch_ms = Some(now_ms);
            return 0;
        }
        let secs = (now_ms - last) / 1000;
        self.last_tick_epoch_ms = Some(last + secs * 1000);
        secs
    }

    fn is_untouched(&self, mode: TimerMode) -> bool {
        !self.is_active && self.mode == mode && self.remaining_secs == self.duration_secs(mode)
    }

    fn clamp_remaining(&mut self) {
        self.remaining_secs = self.remaining_secs.min(self.max_secs());
    }
}

fn minutes_to_secs(minutes: u32) -> u64 {
    u64::from(minutes) * 60
}

fn validate_minutes(field: &str, minutes: u32) -> Result<(), ValidationError> {
    if minutes == 0 || minutes > MAX_DURATION_MINUTES {
        return Err(ValidationError::invalid(
            field,
            format!("must be between 1 and {MAX_DURATION_MINUTES} minutes, got {minutes}"),
        ));
    }
    Ok(())
}

fn sanitize_minutes(minutes: u32, fallback: u32) -> u32 {
    if minutes == 0 || minutes > MAX_DURATION_MINUTES {
        fallback
    } else {
        minutes
    }
}
