//! Wall-clock abstraction.
//!
//! Both the timer and the reminder scheduler work on wall-clock time rather
//! than on tick counts. Hosts pass a [`Clock`] into the runtime so tests can
//! drive time by hand with [`ManualClock`].

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_epoch_ms(&self) -> u64;

    /// Local wall-clock time, used for reminder matching.
    fn now_local(&self) -> NaiveDateTime {
        local_from_epoch_ms(self.now_epoch_ms())
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> u64 {
        now_ms()
    }
}

/// Hand-driven clock for tests and simulations.
///
/// Local time is reported in UTC so results do not depend on the host's
/// time zone.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    epoch_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(epoch_ms: u64) -> Self {
        Self {
            epoch_ms: Arc::new(AtomicU64::new(epoch_ms)),
        }
    }

    /// Start at the given UTC wall-clock time.
    pub fn at(time: NaiveDateTime) -> Self {
        Self::new(time.and_utc().timestamp_millis().max(0) as u64)
    }

    pub fn set(&self, epoch_ms: u64) {
        self.epoch_ms.store(epoch_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.epoch_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs.saturating_mul(1000));
    }
}

impl Clock for ManualClock {
    fn now_epoch_ms(&self) -> u64 {
        self.epoch_ms.load(Ordering::SeqCst)
    }

    fn now_local(&self) -> NaiveDateTime {
        utc_from_epoch_ms(self.now_epoch_ms()).naive_utc()
    }
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn utc_from_epoch_ms(epoch_ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(epoch_ms as i64)
        .single()
        .unwrap_or_default()
}

pub fn local_from_epoch_ms(epoch_ms: u64) -> NaiveDateTime {
    utc_from_epoch_ms(epoch_ms)
        .with_timezone(&Local)
        .naive_local()
}
