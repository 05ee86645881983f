//! Application context and background loops.
//!
//! [`App`] owns the focus timer, the reminder scheduler and the auto-save
//! queue, each behind its own lock, and routes every command through
//! them. The periodic work (timer tick, reminder poll, auto-save flush)
//! runs in [`ScheduledTask`]s: tokio tasks paired with a
//! `CancellationToken` so teardown is deterministic.
//!
//! Each step computes its whole next state under the component's lock and
//! never holds a lock across an await point.
//!
//! Other processes may edit the stored reminder list while the app runs.
//! Polls pick their edits up, and every write of the list merges with
//! what is stored instead of replacing it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::clock::{utc_from_epoch_ms, Clock};
use crate::error::ValidationError;
use crate::events::Event;
use crate::notify::Notifier;
use crate::reminder::{
    snooze_target, ReminderDefinition, ReminderId, ReminderScheduler, RingingAlarm,
    REMINDERS_KEY,
};
use crate::storage::{AutoSaveQueue, Config, PersistentStore, SqliteStore};
use crate::timer::{FocusTimer, TimerMode, TIMER_KEY};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A periodic tokio task that stops when cancelled or dropped.
pub struct ScheduledTask {
    name: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Run `step` every `period` until cancelled. The first run happens
    /// right away; late ticks are delayed, not bunched up.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(name: &'static str, period: Duration, mut step: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let token = CancellationToken::new();
        let cancel = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!("{name} loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => step(),
                }
            }
        });
        tracing::debug!("{name} loop started, period {period:?}");
        Self {
            name,
            token,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop the loop. No step starts after this returns.
    pub fn cancel(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Cancel and wait for the task to finish.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!("{} loop failed to join: {e}", self.name);
                }
            }
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// State shared between [`App`] and its loops.
struct Shared {
    store: Arc<dyn PersistentStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    timer: Mutex<FocusTimer>,
    reminders: Mutex<ReminderScheduler>,
    autosave: Mutex<AutoSaveQueue>,
    sessions: OnceLock<Arc<SqliteStore>>,
    persist_every_secs: AtomicU64,
    events: broadcast::Sender<Event>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn now_ms(&self) -> u64 {
        self.clock.now_epoch_ms()
    }

    fn emit(&self, event: &Event) {
        tracing::debug!(kind = event.kind(), "event");
        // No subscribers is fine.
        let _ = self.events.send(event.clone());
    }

    fn queue_timer(&self, timer: &FocusTimer, now_ms: u64) {
        if let Some(bytes) = timer.snapshot_bytes(now_ms) {
            lock(&self.autosave).queue_save(TIMER_KEY, bytes, now_ms);
        }
    }

    fn queue_reminders(&self, scheduler: &ReminderScheduler, now_ms: u64) {
        if let Some(bytes) = scheduler.to_bytes() {
            lock(&self.autosave).queue_save(REMINDERS_KEY, bytes, now_ms);
        }
    }

    fn record_completion(&self, timer: &FocusTimer, mode: TimerMode, now_ms: u64) {
        let Some(sessions) = self.sessions.get() else {
            return;
        };
        let minutes = match mode {
            TimerMode::Work => timer.work_duration_min(),
            TimerMode::Break => timer.break_duration_min(),
        };
        if let Err(e) = sessions.record_session(mode, minutes, utc_from_epoch_ms(now_ms)) {
            tracing::warn!("failed to record {mode} session: {e}");
        }
    }

    fn tick_timer(&self) -> Option<Event> {
        let now = self.now_ms();
        let mut timer = lock(&self.timer);
        let before = timer.remaining_secs();
        let event = timer.tick(now, self.notifier.as_ref());

        match &event {
            Some(Event::TimerCompleted { completed, .. }) => {
                self.record_completion(&timer, *completed, now);
                self.queue_timer(&timer, now);
            }
            _ => {
                let every = self.persist_every_secs.load(Ordering::Relaxed).max(1);
                if timer.is_active() && before / every != timer.remaining_secs() / every {
                    self.queue_timer(&timer, now);
                }
            }
        }
        drop(timer);

        if let Some(event) = &event {
            self.emit(event);
        }
        event
    }

    fn poll_reminders(&self) -> Vec<Event> {
        let now_ms = self.now_ms();
        let now = self.clock.now_local();
        let mut scheduler = lock(&self.reminders);
        scheduler.refresh(self.store.as_ref());
        let events = scheduler.evaluate(now, self.notifier.as_ref());
        if !events.is_empty() {
            self.queue_reminders(&scheduler, now_ms);
        }
        drop(scheduler);

        for event in &events {
            self.emit(event);
        }
        events
    }

    fn flush_autosave(&self) -> usize {
        let now = self.now_ms();
        self.write_queued(|queue| queue.is_due(now))
    }

    /// Write the auto-save queue if `ready` says so. A queued reminder
    /// list is merged with the stored one first.
    fn write_queued(&self, ready: impl FnOnce(&AutoSaveQueue) -> bool) -> usize {
        let mut scheduler = lock(&self.reminders);
        let mut autosave = lock(&self.autosave);
        if !ready(&autosave) {
            return 0;
        }

        let reminders_queued = autosave.contains(REMINDERS_KEY);
        if reminders_queued && scheduler.refresh(self.store.as_ref()) {
            if let Some(bytes) = scheduler.to_bytes() {
                autosave.replace_pending(REMINDERS_KEY, bytes);
            }
        }
        let written = autosave.force_save(self.store.as_ref());
        if reminders_queued && !autosave.contains(REMINDERS_KEY) {
            scheduler.mark_synced();
        }
        written
    }

    /// Stop the sound of the last timer completion, if any.
    fn silence_timer(&self, timer: &mut FocusTimer) {
        if let Some(handle) = timer.take_alarm() {
            self.notifier.stop(handle);
        }
    }
}

/// Application context.
pub struct App {
    shared: Arc<Shared>,
    config: Config,
    restored: Option<Event>,
    ticker: Option<ScheduledTask>,
    poller: Option<ScheduledTask>,
    saver: Option<ScheduledTask>,
}

impl App {
    /// Build the context from persisted state.
    ///
    /// A fresh snapshot is rehydrated; otherwise the timer starts idle with
    /// the configured durations. Reminders load from the stored list.
    pub fn load(
        store: Arc<dyn PersistentStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        let now = clock.now_epoch_ms();
        let (timer, restored) =
            FocusTimer::load(store.as_ref(), now, config.timer.restore_window_secs);
        let timer = match &restored {
            Some(event) => {
                tracing::info!("restored timer state: {event:?}");
                timer
            }
            None => Self::configured_timer(&config),
        };

        let mut reminders = ReminderScheduler::load(store.as_ref());
        reminders.set_snooze_minutes(config.reminders.snooze_minutes);
        reminders.set_firing_window_secs(config.reminders.firing_window_secs);
        reminders.set_ring_timeout_secs(config.reminders.ring_timeout_secs);
        tracing::debug!("loaded {} reminder(s)", reminders.len());

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Shared {
            store,
            notifier,
            clock,
            timer: Mutex::new(timer),
            reminders: Mutex::new(reminders),
            autosave: Mutex::new(AutoSaveQueue::new(config.autosave.debounce_ms)),
            sessions: OnceLock::new(),
            persist_every_secs: AtomicU64::new(config.timer.persist_every_secs),
            events,
        };

        Self {
            shared: Arc::new(shared),
            config,
            restored,
            ticker: None,
            poller: None,
            saver: None,
        }
    }

    /// Record completed timer phases in the session history.
    pub fn with_session_log(self, sessions: Arc<SqliteStore>) -> Self {
        if self.shared.sessions.set(sessions).is_err() {
            tracing::warn!("session log already attached");
        }
        self
    }

    fn configured_timer(config: &Config) -> FocusTimer {
        let mut timer =
            match FocusTimer::with_durations(config.timer.work_minutes, config.timer.break_minutes)
            {
                Ok(timer) => timer,
                Err(e) => {
                    tracing::warn!("invalid configured durations, using defaults: {e}");
                    FocusTimer::new()
                }
            };
        timer.set_alarm_enabled(config.timer.alarm_enabled);
        timer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The restore event produced at load, if a snapshot was applied.
    pub fn restored(&self) -> Option<&Event> {
        self.restored.as_ref()
    }

    /// Receive every event produced by commands and loops.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    // ── Timer ────────────────────────────────────────────────────────

    pub fn timer(&self) -> FocusTimer {
        lock(&self.shared.timer).clone()
    }

    pub fn timer_state(&self) -> Event {
        let now = self.shared.now_ms();
        lock(&self.shared.timer).state_event(now)
    }

    pub fn timer_start(&self) -> Option<Event> {
        self.timer_command(|timer, now, _| timer.start(now))
    }

    pub fn timer_pause(&self) -> Option<Event> {
        self.timer_command(|timer, now, notifier| timer.pause(now, notifier))
    }

    pub fn timer_toggle(&self) -> Option<Event> {
        self.timer_command(|timer, now, notifier| timer.toggle(now, notifier))
    }

    /// Back to an idle work countdown; the stored snapshot is removed.
    pub fn timer_reset(&self) -> Event {
        let shared = &self.shared;
        let now = shared.now_ms();
        let mut timer = lock(&shared.timer);
        shared.silence_timer(&mut timer);
        let event = timer.reset(now);
        drop(timer);

        lock(&shared.autosave).discard(TIMER_KEY);
        FocusTimer::clear_persisted(shared.store.as_ref());
        shared.emit(&event);
        event
    }

    pub fn set_work_duration(&self, minutes: u32) -> Result<Event, ValidationError> {
        self.timer_setting(|timer| timer.set_work_duration(minutes))
    }

    pub fn set_break_duration(&self, minutes: u32) -> Result<Event, ValidationError> {
        self.timer_setting(|timer| timer.set_break_duration(minutes))
    }

    pub fn set_alarm_enabled(&self, enabled: bool) -> Event {
        let result = self.timer_setting(|timer| {
            timer.set_alarm_enabled(enabled);
            Ok(())
        });
        match result {
            Ok(event) => event,
            Err(_) => self.timer_state(),
        }
    }

    /// One timer step; the ticker loop calls this every tick interval.
    pub fn tick_timer(&self) -> Option<Event> {
        self.shared.tick_timer()
    }

    fn timer_command(
        &self,
        command: impl FnOnce(&mut FocusTimer, u64, &dyn Notifier) -> Option<Event>,
    ) -> Option<Event> {
        let shared = &self.shared;
        let now = shared.now_ms();
        let mut timer = lock(&shared.timer);
        shared.silence_timer(&mut timer);
        let event = command(&mut timer, now, shared.notifier.as_ref());
        if let Some(Event::TimerCompleted { completed, .. }) = &event {
            shared.record_completion(&timer, *completed, now);
        }
        if event.is_some() {
            shared.queue_timer(&timer, now);
        }
        drop(timer);

        if let Some(event) = &event {
            shared.emit(event);
        }
        event
    }

    fn timer_setting(
        &self,
        setting: impl FnOnce(&mut FocusTimer) -> Result<(), ValidationError>,
    ) -> Result<Event, ValidationError> {
        let shared = &self.shared;
        let now = shared.now_ms();
        let mut timer = lock(&shared.timer);
        setting(&mut timer)?;
        shared.queue_timer(&timer, now);
        let event = timer.state_event(now);
        drop(timer);

        shared.emit(&event);
        Ok(event)
    }

    // ── Reminders ────────────────────────────────────────────────────

    pub fn reminders(&self) -> Vec<ReminderDefinition> {
        lock(&self.shared.reminders).reminders().to_vec()
    }

    pub fn reminder(&self, id: &ReminderId) -> Option<ReminderDefinition> {
        lock(&self.shared.reminders).get(id).cloned()
    }

    pub fn ringing(&self) -> Vec<RingingAlarm> {
        lock(&self.shared.reminders).ringing().to_vec()
    }

    pub fn add_reminder(&self, definition: ReminderDefinition) -> Result<ReminderId, ValidationError> {
        self.reminder_command(|scheduler, _| scheduler.add(definition))
    }

    pub fn update_reminder(&self, definition: ReminderDefinition) -> Result<(), ValidationError> {
        self.reminder_command(|scheduler, _| scheduler.update(definition))
    }

    pub fn remove_reminder(&self, id: &ReminderId) -> Result<ReminderDefinition, ValidationError> {
        self.reminder_command(|scheduler, notifier| scheduler.remove(id, notifier))
    }

    pub fn toggle_reminder(&self, id: &ReminderId) -> Result<bool, ValidationError> {
        self.reminder_command(|scheduler, _| scheduler.toggle(id))
    }

    /// Snooze a ringing (or stored) reminder.
    pub fn snooze_reminder(&self, id: &ReminderId) -> Result<Event, ValidationError> {
        let now = self.shared.clock.now_local();
        let (snooze_id, minutes) = self.reminder_command(|scheduler, notifier| {
            let snooze_id = scheduler.snooze(id, now, notifier)?;
            Ok((snooze_id, scheduler.snooze_minutes()))
        })?;
        let event = Event::ReminderSnoozed {
            id: id.clone(),
            snooze_id,
            until: snooze_target(now, minutes),
        };
        self.shared.emit(&event);
        Ok(event)
    }

    pub fn dismiss_reminder(&self, id: &ReminderId) -> Option<Event> {
        let event = lock(&self.shared.reminders).dismiss(id, self.shared.notifier.as_ref());
        if let Some(event) = &event {
            self.shared.emit(event);
        }
        event
    }

    pub fn dismiss_all_reminders(&self) -> Vec<Event> {
        let events = lock(&self.shared.reminders).dismiss_all(self.shared.notifier.as_ref());
        for event in &events {
            self.shared.emit(event);
        }
        events
    }

    /// One reminder poll; the poller loop calls this every poll interval.
    pub fn poll_reminders(&self) -> Vec<Event> {
        self.shared.poll_reminders()
    }

    fn reminder_command<T>(
        &self,
        command: impl FnOnce(&mut ReminderScheduler, &dyn Notifier) -> Result<T, ValidationError>,
    ) -> Result<T, ValidationError> {
        let shared = &self.shared;
        let now = shared.now_ms();
        let mut scheduler = lock(&shared.reminders);
        let value = command(&mut scheduler, shared.notifier.as_ref())?;
        shared.queue_reminders(&scheduler, now);
        Ok(value)
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Write queued payloads whose debounce period elapsed.
    pub fn flush_autosave(&self) -> usize {
        self.shared.flush_autosave()
    }

    /// Keys waiting in the auto-save queue.
    pub fn pending_saves(&self) -> Vec<String> {
        lock(&self.shared.autosave)
            .pending_keys()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    // ── Loops ────────────────────────────────────────────────────────

    pub fn spawn_timer_ticker(&mut self) {
        let shared = Arc::clone(&self.shared);
        let period = Duration::from_millis(self.config.timer.tick_interval_ms);
        self.ticker = Some(ScheduledTask::spawn("timer ticker", period, move || {
            shared.tick_timer();
        }));
    }

    pub fn spawn_reminder_poller(&mut self) {
        let shared = Arc::clone(&self.shared);
        let period = Duration::from_secs(self.config.reminders.poll_interval_secs);
        self.poller = Some(ScheduledTask::spawn("reminder poller", period, move || {
            shared.poll_reminders();
        }));
    }

    pub fn spawn_autosave(&mut self) {
        let shared = Arc::clone(&self.shared);
        let period = Duration::from_millis(self.config.autosave.debounce_ms.clamp(100, 1000));
        self.saver = Some(ScheduledTask::spawn("auto-save", period, move || {
            shared.flush_autosave();
        }));
    }

    /// Start every loop.
    pub fn spawn_all(&mut self) {
        self.spawn_timer_ticker();
        self.spawn_reminder_poller();
        self.spawn_autosave();
    }

    pub fn restart_timer_ticker(&mut self) {
        if let Some(mut task) = self.ticker.take() {
            task.cancel();
        }
        self.spawn_timer_ticker();
    }

    pub fn restart_reminder_poller(&mut self) {
        if let Some(mut task) = self.poller.take() {
            task.cancel();
        }
        self.spawn_reminder_poller();
    }

    pub fn restart_autosave(&mut self) {
        if let Some(mut task) = self.saver.take() {
            task.cancel();
        }
        self.spawn_autosave();
    }

    /// Names of the loops currently running.
    pub fn running_tasks(&self) -> Vec<&'static str> {
        [&self.ticker, &self.poller, &self.saver]
            .into_iter()
            .flatten()
            .filter(|task| !task.is_cancelled())
            .map(ScheduledTask::name)
            .collect()
    }

    /// Apply a new configuration and restart the loops that were running.
    pub fn apply_config(&mut self, config: Config) -> Result<(), ValidationError> {
        {
            let now = self.shared.now_ms();
            let mut timer = lock(&self.shared.timer);
            let mut updated = timer.clone();
            updated.set_work_duration(config.timer.work_minutes)?;
            updated.set_break_duration(config.timer.break_minutes)?;
            updated.set_alarm_enabled(config.timer.alarm_enabled);
            *timer = updated;
            self.shared.queue_timer(&timer, now);
        }
        {
            let mut scheduler = lock(&self.shared.reminders);
            scheduler.set_snooze_minutes(config.reminders.snooze_minutes);
            scheduler.set_firing_window_secs(config.reminders.firing_window_secs);
            scheduler.set_ring_timeout_secs(config.reminders.ring_timeout_secs);
        }
        self.shared
            .persist_every_secs
            .store(config.timer.persist_every_secs, Ordering::Relaxed);

        let restart_ticker = self.ticker.is_some()
            && config.timer.tick_interval_ms != self.config.timer.tick_interval_ms;
        let restart_poller = self.poller.is_some()
            && config.reminders.poll_interval_secs != self.config.reminders.poll_interval_secs;
        let restart_saver =
            self.saver.is_some() && config.autosave.debounce_ms != self.config.autosave.debounce_ms;
        self.config = config;

        if restart_ticker {
            self.restart_timer_ticker();
        }
        if restart_poller {
            self.restart_reminder_poller();
        }
        if restart_saver {
            self.restart_autosave();
        }
        Ok(())
    }

    /// Cancel every loop, snapshot the timer and write everything queued.
    /// The reminder list is written only if it changed here, merged with
    /// the stored list.
    ///
    /// Returns the number of keys written.
    pub fn shutdown(&mut self) -> usize {
        for task in [&mut self.ticker, &mut self.poller, &mut self.saver] {
            if let Some(mut task) = task.take() {
                task.cancel();
            }
        }

        let shared = &self.shared;
        let now = shared.now_ms();
        {
            let timer = lock(&shared.timer);
            shared.queue_timer(&timer, now);
        }
        {
            let scheduler = lock(&shared.reminders);
            if scheduler.has_local_changes() {
                shared.queue_reminders(&scheduler, now);
            }
        }
        let written = shared.write_queued(|_| true);
        tracing::info!("shutdown complete, saved {written} key(s)");
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notify::MemoryNotifier;
    use crate::reminder::ScheduleKind;
    use crate::storage::MemoryStore;
    use crate::timer::{TimerSnapshot, TimerStatus};
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicUsize;

    struct Harness {
        store: Arc<MemoryStore>,
        notifier: Arc<MemoryNotifier>,
        clock: ManualClock,
    }

    impl Harness {
        fn new() -> Self {
            let start = NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(8, 59, 55)
                .unwrap();
            Self {
                store: Arc::new(MemoryStore::new()),
                notifier: Arc::new(MemoryNotifier::new()),
                clock: ManualClock::at(start),
            }
        }

        fn app(&self, config: Config) -> App {
            App::load(
                self.store.clone(),
                self.notifier.clone(),
                Arc::new(self.clock.clone()),
                config,
            )
        }
    }

    fn one_minute_config() -> Config {
        let mut config = Config::default();
        config.timer.work_minutes = 1;
        config.timer.break_minutes = 1;
        config
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(clock: &ManualClock, secs: u64) {
        clock.advance_secs(secs);
        tokio::time::advance(Duration::from_secs(secs)).await;
        settle().await;
    }

    #[test]
    fn load_uses_configured_durations_without_snapshot() {
        let h = Harness::new();
        let app = h.app(one_minute_config());
        assert!(app.restored().is_none());
        assert_eq!(app.timer().remaining_secs(), 60);
    }

    #[test]
    fn load_rehydrates_recent_snapshot() {
        let h = Harness::new();
        let snapshot = TimerSnapshot {
            remaining_seconds: 100,
            is_active: true,
            mode: TimerMode::Work,
            work_duration_minutes: 25,
            break_duration_minutes: 5,
            alarm_enabled: true,
            last_update: Some(h.clock.now_epoch_ms() - 30_000),
        };
        h.store.save(TIMER_KEY, &snapshot.to_bytes().unwrap()).unwrap();

        let app = h.app(Config::default());
        assert!(matches!(app.restored(), Some(Event::TimerRestored { .. })));
        let timer = app.timer();
        assert_eq!(timer.remaining_secs(), 70);
        assert!(timer.is_active());
    }

    #[test]
    fn commands_queue_and_shutdown_saves() {
        let h = Harness::new();
        let mut app = h.app(Config::default());
        assert!(app.timer_start().is_some());
        assert_eq!(app.pending_saves(), vec!["timer".to_string()]);

        let def = ReminderDefinition::new("Water", "10:00".parse().unwrap(), ScheduleKind::Daily);
        app.add_reminder(def).unwrap();
        assert_eq!(app.flush_autosave(), 0);

        assert_eq!(app.shutdown(), 2);
        assert!(h.store.load(TIMER_KEY).unwrap().is_some());
        let reloaded = h.app(Config::default());
        assert_eq!(reloaded.reminders().len(), 1);
        assert!(reloaded.timer().is_active());
    }

    #[test]
    fn debounced_flush_after_quiet_period() {
        let h = Harness::new();
        let app = h.app(Config::default());
        app.timer_start();
        h.clock.advance_ms(999);
        assert_eq!(app.flush_autosave(), 0);
        h.clock.advance_ms(1);
        assert_eq!(app.flush_autosave(), 1);
        assert!(app.pending_saves().is_empty());
    }

    #[test]
    fn reset_removes_snapshot() {
        let h = Harness::new();
        let mut app = h.app(Config::default());
        app.timer_start();
        app.shutdown();
        assert!(h.store.load(TIMER_KEY).unwrap().is_some());

        let app = h.app(Config::default());
        app.timer_reset();
        assert!(h.store.load(TIMER_KEY).unwrap().is_none());
        assert!(app.pending_saves().is_empty());
        assert_eq!(app.timer().status(), TimerStatus::IdleWork);
    }

    #[test]
    fn ticking_persists_every_ten_countdown_seconds() {
        let h = Harness::new();
        let mut config = Config::default();
        config.autosave.debounce_ms = 0;
        let app = h.app(config);
        app.timer_start();
        assert_eq!(app.flush_autosave(), 1);

        // 1500 -> 1470: the countdown crosses 1499, 1489 and 1479.
        let mut writes = 0;
        for _ in 0..30 {
            h.clock.advance_secs(1);
            app.tick_timer();
            writes += app.flush_autosave();
        }
        assert_eq!(app.timer().remaining_secs(), 1470);
        assert_eq!(writes, 3);
    }

    #[test]
    fn completion_records_session() {
        let h = Harness::new();
        let sessions = Arc::new(SqliteStore::open_memory().unwrap());
        let app = h.app(one_minute_config()).with_session_log(sessions.clone());
        app.timer_start();
        h.clock.advance_secs(60);
        let event = app.tick_timer();
        assert!(matches!(event, Some(Event::TimerCompleted { .. })));
        assert_eq!(app.timer().mode(), TimerMode::Break);

        let recent = sessions.recent_sessions(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].mode, TimerMode::Work);
        assert_eq!(recent[0].duration_min, 1);
    }

    #[test]
    fn starting_again_silences_completion_alarm() {
        let h = Harness::new();
        let app = h.app(one_minute_config());
        app.timer_start();
        h.clock.advance_secs(60);
        app.tick_timer();
        assert_eq!(h.notifier.playing().len(), 1);
        app.timer_start();
        assert!(h.notifier.playing().is_empty());
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let h = Harness::new();
        let app = h.app(Config::default());
        assert!(app.set_work_duration(0).is_err());
        assert!(matches!(
            app.set_break_duration(10),
            Ok(Event::StateSnapshot {
                break_duration_min: 10,
                ..
            })
        ));
    }

    #[test]
    fn snooze_reports_target_minute() {
        let h = Harness::new();
        let app = h.app(Config::default());
        let id = app
            .add_reminder(ReminderDefinition::new(
                "Stand up",
                "09:00".parse().unwrap(),
                ScheduleKind::Daily,
            ))
            .unwrap();
        h.clock.advance_secs(10);
        assert_eq!(app.poll_reminders().len(), 1);
        assert_eq!(app.ringing().len(), 1);

        let event = app.snooze_reminder(&id).unwrap();
        let Event::ReminderSnoozed {
            snooze_id, until, ..
        } = event
        else {
            panic!("expected a snooze event");
        };
        assert_eq!(until.to_string(), "2024-03-04 09:05:00");
        assert!(app.reminder(&snooze_id).unwrap().is_transient_snooze);
        assert!(app.ringing().is_empty());
    }

    #[test]
    fn shutdown_keeps_reminders_saved_by_another_app() {
        let h = Harness::new();
        let mut first = h.app(Config::default());
        let mut second = h.app(Config::default());
        second
            .add_reminder(ReminderDefinition::new(
                "Water",
                "10:00".parse().unwrap(),
                ScheduleKind::Daily,
            ))
            .unwrap();
        second.shutdown();

        first.timer_start();
        assert_eq!(first.shutdown(), 1);
        let stored = ReminderScheduler::load(h.store.as_ref());
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.reminders()[0].title, "Water");
    }

    #[test]
    fn flush_merges_reminder_edits_from_both_apps() {
        let h = Harness::new();
        let mut config = Config::default();
        config.autosave.debounce_ms = 0;
        let first = h.app(config.clone());
        let second = h.app(config);

        first
            .add_reminder(ReminderDefinition::new(
                "Stand up",
                "09:00".parse().unwrap(),
                ScheduleKind::Daily,
            ))
            .unwrap();
        second
            .add_reminder(ReminderDefinition::new(
                "Water",
                "10:00".parse().unwrap(),
                ScheduleKind::Daily,
            ))
            .unwrap();
        assert_eq!(second.flush_autosave(), 1);
        assert_eq!(first.flush_autosave(), 1);

        let titles: Vec<String> = ReminderScheduler::load(h.store.as_ref())
            .reminders()
            .iter()
            .map(|r| r.title.clone())
            .collect();
        assert_eq!(titles, ["Stand up", "Water"]);
        assert_eq!(first.reminders().len(), 2);
    }

    #[test]
    fn poll_sees_reminder_added_by_another_app() {
        let h = Harness::new();
        let running = h.app(Config::default());
        let mut editor = h.app(Config::default());
        editor
            .add_reminder(ReminderDefinition::new(
                "Stand up",
                "09:00".parse().unwrap(),
                ScheduleKind::Daily,
            ))
            .unwrap();
        editor.shutdown();

        h.clock.advance_secs(10);
        let fired = running.poll_reminders();
        assert!(matches!(
            fired.as_slice(),
            [Event::ReminderFired { title, .. }] if title == "Stand up"
        ));
    }

    #[test]
    fn unanswered_daily_reminder_rings_again_next_day() {
        let h = Harness::new();
        let app = h.app(Config::default());
        app.add_reminder(ReminderDefinition::new(
            "Stand up",
            "09:00".parse().unwrap(),
            ScheduleKind::Daily,
        ))
        .unwrap();
        h.clock.advance_secs(10);
        assert_eq!(app.poll_reminders().len(), 1);

        h.clock.advance_secs(86_400);
        let kinds: Vec<&str> = app.poll_reminders().iter().map(Event::kind).collect();
        assert_eq!(kinds, ["ReminderExpired", "ReminderFired"]);
        assert_eq!(h.notifier.notification_count(), 2);
        assert_eq!(h.notifier.playing().len(), 1);
    }

    #[test]
    fn apply_config_updates_components() {
        let h = Harness::new();
        let mut app = h.app(Config::default());
        let mut config = Config::default();
        config.timer.work_minutes = 50;
        config.reminders.snooze_minutes = 10;
        app.apply_config(config).unwrap();
        assert_eq!(app.timer().remaining_secs(), 50 * 60);
        assert_eq!(app.config().reminders.snooze_minutes, 10);

        let mut bad = Config::default();
        bad.timer.work_minutes = 0;
        assert!(app.apply_config(bad).is_err());
        assert_eq!(app.timer().work_duration_min(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_task_runs_until_dropped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let task = ScheduledTask::spawn("counter", Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        drop(task);
        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_completes_delayed_session() {
        let h = Harness::new();
        let mut app = h.app(one_minute_config());
        let mut events = app.subscribe();
        app.timer_start();
        app.spawn_timer_ticker();
        settle().await;

        // A single late tick still accounts for the whole minute.
        h.clock.advance_secs(60);
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;

        assert_eq!(app.timer().mode(), TimerMode::Break);
        assert_eq!(h.notifier.notification_count(), 1);
        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(kinds, vec!["TimerStarted", "TimerCompleted"]);
        app.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn poller_fires_daily_reminder_once() {
        let h = Harness::new();
        let mut app = h.app(Config::default());
        app.add_reminder(ReminderDefinition::new(
            "Stand up",
            "09:00".parse().unwrap(),
            ScheduleKind::Daily,
        ))
        .unwrap();
        app.spawn_reminder_poller();
        settle().await;
        assert_eq!(h.notifier.notification_count(), 0);

        for _ in 0..6 {
            advance(&h.clock, 10).await;
            app.dismiss_all_reminders();
        }
        assert_eq!(h.notifier.notification_count(), 1);
        assert_eq!(h.notifier.titles(), vec!["Stand up".to_string()]);
        app.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_loop_flushes_after_debounce() {
        let h = Harness::new();
        let mut app = h.app(Config::default());
        app.spawn_autosave();
        app.timer_start();
        settle().await;
        assert!(h.store.load(TIMER_KEY).unwrap().is_none());

        advance(&h.clock, 1).await;
        assert!(h.store.load(TIMER_KEY).unwrap().is_some());
        app.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_every_loop() {
        let h = Harness::new();
        let mut app = h.app(one_minute_config());
        app.timer_start();
        app.spawn_all();
        settle().await;
        assert_eq!(app.running_tasks().len(), 3);

        app.shutdown();
        assert!(app.running_tasks().is_empty());
        advance(&h.clock, 120).await;
        assert_eq!(app.timer().mode(), TimerMode::Work);
        assert_eq!(h.notifier.notification_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_ticker() {
        let h = Harness::new();
        let mut app = h.app(Config::default());
        app.spawn_timer_ticker();
        app.restart_timer_ticker();
        assert_eq!(app.running_tasks(), vec!["timer ticker"]);

        let mut config = Config::default();
        config.timer.tick_interval_ms = 500;
        app.apply_config(config).unwrap();
        assert_eq!(app.running_tasks(), vec!["timer ticker"]);
        app.shutdown();
    }
}
