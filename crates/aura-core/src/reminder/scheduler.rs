//! Reminder scheduler.
//!
//! Holds the reminder list and decides, on each poll, which reminders are
//! due. Like the focus timer it owns no threads: the runtime calls
//! [`ReminderScheduler::evaluate`] every poll interval with the current
//! local time.
//!
//! ## Due rules
//!
//! - One-time: the date is today and the reminder minute started less
//!   than the firing window (60 s) ago.
//! - Daily: the current hour:minute equals the reminder time.
//! - Weekly: the daily rule, on a listed weekday.
//!
//! Recurring reminders remember the local date they last fired on, so the
//! several polls that land inside one minute fire them once. A ringing
//! reminder that nobody dismisses or snoozes expires after the ring timeout,
//! or when the date changes, so it can fire at its next occurrence.
//!
//! ## Shared list
//!
//! Several processes may edit the stored list. The scheduler tracks which
//! ids it added, changed or removed since it last synced, and
//! [`ReminderScheduler::merge_stored`] folds those changes into the stored
//! list instead of overwriting it.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDateTime, Timelike, Utc};

use super::definition::{
    parse_reminder_document, parse_reminder_list, ReminderCategory, ReminderDefinition,
    ReminderId, ScheduleKind, TimeOfDay,
};
use crate::clock::local_from_epoch_ms;
use crate::error::ValidationError;
use crate::events::Event;
use crate::notify::{deliver, AlarmHandle, Notifier};
use crate::storage::PersistentStore;

/// Storage key of the reminder list.
pub const REMINDERS_KEY: &str = "reminders";
pub const DEFAULT_SNOOZE_MINUTES: u32 = 5;
pub const DEFAULT_FIRING_WINDOW_SECS: u64 = 60;
pub const DEFAULT_RING_TIMEOUT_SECS: u64 = 300;

/// A reminder that fired and has not been dismissed or snoozed yet.
///
/// Carries its own copy of the reminder's text, so a snooze copy that was
/// removed after firing can still be snoozed again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingingAlarm {
    pub id: ReminderId,
    pub title: String,
    pub message: String,
    pub category: ReminderCategory,
    pub fired_at: NaiveDateTime,
    alarm: Option<AlarmHandle>,
}

impl RingingAlarm {
    pub fn alarm(&self) -> Option<AlarmHandle> {
        self.alarm
    }
}

#[derive(Debug, Clone)]
pub struct ReminderScheduler {
    /// Newest first.
    reminders: Vec<ReminderDefinition>,
    ringing: Vec<RingingAlarm>,
    snooze_minutes: u32,
    firing_window_secs: u64,
    ring_timeout_secs: u64,
    /// Local changes not yet merged into the stored list.
    added: BTreeSet<ReminderId>,
    modified: BTreeSet<ReminderId>,
    removed: BTreeSet<ReminderId>,
}

impl Default for ReminderScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ReminderScheduler {
    pub fn new() -> Self {
        Self {
            reminders: Vec::new(),
            ringing: Vec::new(),
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            firing_window_secs: DEFAULT_FIRING_WINDOW_SECS,
            ring_timeout_secs: DEFAULT_RING_TIMEOUT_SECS,
            added: BTreeSet::new(),
            modified: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }

    /// Scheduler over an existing list (e.g. loaded from storage).
    pub fn with_reminders(reminders: Vec<ReminderDefinition>) -> Self {
        let mut scheduler = Self::new();
        scheduler.reminders = reminders;
        scheduler
    }

    pub fn set_snooze_minutes(&mut self, minutes: u32) {
        self.snooze_minutes = minutes.max(1);
    }

    pub fn set_firing_window_secs(&mut self, secs: u64) {
        self.firing_window_secs = secs.max(1);
    }

    pub fn set_ring_timeout_secs(&mut self, secs: u64) {
        self.ring_timeout_secs = secs.max(1);
    }

    pub fn snooze_minutes(&self) -> u32 {
        self.snooze_minutes
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn reminders(&self) -> &[ReminderDefinition] {
        &self.reminders
    }

    pub fn get(&self, id: &ReminderId) -> Option<&ReminderDefinition> {
        self.reminders.iter().find(|r| &r.id == id)
    }

    pub fn len(&self) -> usize {
        self.reminders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty()
    }

    pub fn ringing(&self) -> &[RingingAlarm] {
        &self.ringing
    }

    pub fn is_ringing(&self, id: &ReminderId) -> bool {
        self.ringing.iter().any(|r| &r.id == id)
    }

    // ── CRUD ─────────────────────────────────────────────────────────

    /// Add a reminder at the front of the list.
    pub fn add(&mut self, mut definition: ReminderDefinition) -> Result<ReminderId, ValidationError> {
        definition.validate()?;
        if self.get(&definition.id).is_some() {
            return Err(ValidationError::Duplicate {
                kind: "reminder",
                id: definition.id.to_string(),
            });
        }
        let id = definition.id.clone();
        tracing::debug!("added reminder {id} ({})", definition.schedule.describe());
        self.reminders.insert(0, definition);
        self.mark_added(&id);
        Ok(id)
    }

    /// Replace the reminder with the same id, keeping its position.
    ///
    /// Changing the time or schedule clears the last-fired guard so the
    /// edited reminder can fire today.
    pub fn update(&mut self, mut definition: ReminderDefinition) -> Result<(), ValidationError> {
        definition.validate()?;
        let slot = self
            .reminders
            .iter_mut()
            .find(|r| r.id == definition.id)
            .ok_or_else(|| not_found(&definition.id))?;
        if slot.time != definition.time || slot.schedule != definition.schedule {
            definition.last_fired_on = None;
        }
        *slot = definition;
        let id = slot.id.clone();
        self.mark_modified(&id);
        Ok(())
    }

    /// Remove a reminder, stopping its alarm if it is ringing.
    pub fn remove(
        &mut self,
        id: &ReminderId,
        notifier: &dyn Notifier,
    ) -> Result<ReminderDefinition, ValidationError> {
        let index = self
            .reminders
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| not_found(id))?;
        self.stop_ringing(id, notifier);
        self.mark_removed(id);
        Ok(self.reminders.remove(index))
    }

    /// Flip `enabled`. Returns the new value.
    pub fn toggle(&mut self, id: &ReminderId) -> Result<bool, ValidationError> {
        let reminder = self
            .reminders
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| not_found(id))?;
        reminder.enabled = !reminder.enabled;
        let enabled = reminder.enabled;
        self.mark_modified(id);
        Ok(enabled)
    }

    // ── Evaluation ───────────────────────────────────────────────────

    /// Expire stale ringing alarms, then fire every reminder due at `now`
    /// (local wall-clock time).
    pub fn evaluate(&mut self, now: NaiveDateTime, notifier: &dyn Notifier) -> Vec<Event> {
        let mut events = self.expire_ringing(now, notifier);
        let due: Vec<ReminderId> = self
            .reminders
            .iter()
            .filter(|r| self.is_due(r, now))
            .map(|r| r.id.clone())
            .collect();

        events.extend(due.iter().filter_map(|id| self.fire(id, now, notifier)));
        events
    }

    /// Stop alarms that rang longer than the ring timeout or since an
    /// earlier day.
    fn expire_ringing(&mut self, now: NaiveDateTime, notifier: &dyn Notifier) -> Vec<Event> {
        let timeout = Duration::seconds(clamp_to_day(self.ring_timeout_secs));
        let (expired, ringing): (Vec<_>, Vec<_>) = self
            .ringing
            .drain(..)
            .partition(|r| r.fired_at.date() != now.date() || now - r.fired_at >= timeout);
        self.ringing = ringing;

        expired
            .into_iter()
            .map(|ringing| {
                if let Some(handle) = ringing.alarm {
                    notifier.stop(handle);
                }
                tracing::info!("reminder '{}' stopped ringing unanswered", ringing.title);
                Event::ReminderExpired {
                    id: ringing.id,
                    fired_at: ringing.fired_at,
                }
            })
            .collect()
    }

    /// [`Self::evaluate`] with an epoch timestamp, converted to local time.
    pub fn evaluate_epoch_ms(&mut self, now_ms: u64, notifier: &dyn Notifier) -> Vec<Event> {
        self.evaluate(local_from_epoch_ms(now_ms), notifier)
    }

    fn is_due(&self, reminder: &ReminderDefinition, now: NaiveDateTime) -> bool {
        if !reminder.enabled || self.is_ringing(&reminder.id) {
            return false;
        }
        let today = now.date();
        match reminder.schedule {
            ScheduleKind::OneTime(date) => {
                if date != today {
                    return false;
                }
                let at = reminder.time.on(today);
                at <= now && (now - at) < Duration::seconds(self.window_secs())
            }
            ScheduleKind::Daily | ScheduleKind::Weekly(_) => {
                reminder.schedule.occurs_on(today)
                    && reminder.time.matches(now)
                    && reminder.last_fired_on != Some(today)
            }
        }
    }

    fn window_secs(&self) -> i64 {
        clamp_to_day(self.firing_window_secs)
    }

    fn fire(&mut self, id: &ReminderId, now: NaiveDateTime, notifier: &dyn Notifier) -> Option<Event> {
        let index = self.reminders.iter().position(|r| &r.id == id)?;
        let reminder = &mut self.reminders[index];

        deliver(notifier, &reminder.title, &reminder.message);
        let alarm = notifier.play_alarm_sound();
        reminder.last_fired_on = Some(now.date());

        let ringing = RingingAlarm {
            id: reminder.id.clone(),
            title: reminder.title.clone(),
            message: reminder.message.clone(),
            category: reminder.category,
            fired_at: now,
            alarm,
        };

        let removed = reminder.is_transient_snooze;
        if removed {
            self.reminders.remove(index);
            self.mark_removed(&ringing.id);
        } else {
            if reminder.schedule.is_one_time() {
                reminder.enabled = false;
            }
            self.mark_modified(&ringing.id);
        }

        tracing::info!("reminder '{}' fired", ringing.title);
        let event = Event::ReminderFired {
            id: ringing.id.clone(),
            title: ringing.title.clone(),
            message: ringing.message.clone(),
            removed,
            at: now,
        };
        self.ringing.push(ringing);
        Some(event)
    }

    // ── Ringing alarms ───────────────────────────────────────────────

    /// Stop a ringing reminder and schedule a transient one-time copy
    /// `snooze_minutes` from `now`.
    ///
    /// The copy carries the ringing reminder's text; a reminder that is not
    /// ringing but still exists may be snoozed too. Returns the copy's id.
    pub fn snooze(
        &mut self,
        id: &ReminderId,
        now: NaiveDateTime,
        notifier: &dyn Notifier,
    ) -> Result<ReminderId, ValidationError> {
        let (title, message, category) = match self.stop_ringing(id, notifier) {
            Some(ringing) => (ringing.title, ringing.message, ringing.category),
            None => {
                let reminder = self.get(id).ok_or_else(|| not_found(id))?;
                (
                    reminder.title.clone(),
                    reminder.message.clone(),
                    reminder.category,
                )
            }
        };

        let until = snooze_target(now, self.snooze_minutes);
        let mut copy = ReminderDefinition::new(
            title,
            TimeOfDay::from_naive(until.time()),
            ScheduleKind::OneTime(until.date()),
        )
        .with_message(message)
        .with_category(category);
        copy.is_transient_snooze = true;
        copy.created_at = Utc::now();

        let snooze_id = copy.id.clone();
        tracing::info!("reminder {id} snoozed until {until}");
        self.reminders.insert(0, copy);
        self.mark_added(&snooze_id);
        Ok(snooze_id)
    }

    /// Stop a ringing reminder. Returns `None` if it was not ringing.
    pub fn dismiss(&mut self, id: &ReminderId, notifier: &dyn Notifier) -> Option<Event> {
        self.stop_ringing(id, notifier)
            .map(|ringing| Event::ReminderDismissed { id: ringing.id })
    }

    /// Stop every ringing reminder.
    pub fn dismiss_all(&mut self, notifier: &dyn Notifier) -> Vec<Event> {
        self.ringing
            .drain(..)
            .map(|ringing| {
                if let Some(handle) = ringing.alarm {
                    notifier.stop(handle);
                }
                Event::ReminderDismissed { id: ringing.id }
            })
            .collect()
    }

    fn stop_ringing(&mut self, id: &ReminderId, notifier: &dyn Notifier) -> Option<RingingAlarm> {
        let index = self.ringing.iter().position(|r| &r.id == id)?;
        let ringing = self.ringing.remove(index);
        if let Some(handle) = ringing.alarm {
            notifier.stop(handle);
        }
        Some(ringing)
    }

    // ── Change tracking ──────────────────────────────────────────────

    fn mark_added(&mut self, id: &ReminderId) {
        self.removed.remove(id);
        self.added.insert(id.clone());
    }

    fn mark_modified(&mut self, id: &ReminderId) {
        if !self.added.contains(id) {
            self.modified.insert(id.clone());
        }
    }

    fn mark_removed(&mut self, id: &ReminderId) {
        self.modified.remove(id);
        if !self.added.remove(id) {
            self.removed.insert(id.clone());
        }
    }

    /// Whether there are local changes the stored list does not have yet.
    pub fn has_local_changes(&self) -> bool {
        !(self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty())
    }

    /// Fold local changes into `stored`, the list as another writer left it.
    ///
    /// Reminders this scheduler added, changed or removed keep the local
    /// version; everything else follows `stored`, including reminders
    /// added or removed elsewhere. Local additions stay at the front.
    pub fn merge_stored(&mut self, stored: Vec<ReminderDefinition>) {
        let mut local: Vec<Option<ReminderDefinition>> =
            std::mem::take(&mut self.reminders).into_iter().map(Some).collect();
        let mut take_local = |id: &ReminderId| {
            local
                .iter_mut()
                .find(|slot| matches!(slot, Some(r) if &r.id == id))
                .and_then(Option::take)
        };

        let mut merged = Vec::with_capacity(stored.len());
        let mut seen = BTreeSet::new();
        for theirs in stored {
            if self.removed.contains(&theirs.id) || !seen.insert(theirs.id.clone()) {
                continue;
            }
            let mine = if self.added.contains(&theirs.id) || self.modified.contains(&theirs.id) {
                take_local(&theirs.id)
            } else {
                None
            };
            merged.push(mine.unwrap_or(theirs));
        }

        let fresh: Vec<ReminderDefinition> = local
            .into_iter()
            .flatten()
            .filter(|r| self.added.contains(&r.id) && !seen.contains(&r.id))
            .collect();
        self.reminders = fresh.into_iter().chain(merged).collect();
    }

    /// Forget tracked changes after the merged list was written.
    pub fn mark_synced(&mut self) {
        self.added.clear();
        self.modified.clear();
        self.removed.clear();
    }

    /// Merge the stored list into this one. Returns `false`, keeping the
    /// local list, when the store cannot be read or holds a malformed list.
    pub fn refresh(&mut self, store: &dyn PersistentStore) -> bool {
        let stored = match store.load(REMINDERS_KEY) {
            Ok(Some(bytes)) => match parse_reminder_document(&bytes) {
                Some(stored) => stored,
                None => return false,
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("failed to reload reminders: {e}");
                return false;
            }
        };
        self.merge_stored(stored);
        true
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Load the stored list. Missing, unreadable and malformed lists give
    /// an empty scheduler.
    pub fn load(store: &dyn PersistentStore) -> Self {
        match store.load(REMINDERS_KEY) {
            Ok(Some(bytes)) => Self::with_reminders(parse_reminder_list(&bytes)),
            Ok(None) => Self::new(),
            Err(e) => {
                tracing::warn!("failed to load reminders: {e}");
                Self::new()
            }
        }
    }

    /// Serialized list ready for the store or the auto-save queue.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match serde_json::to_vec(&self.reminders) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("failed to serialize reminders: {e}");
                None
            }
        }
    }

    /// Write the list now. Failures are logged.
    pub fn persist(&self, store: &dyn PersistentStore) -> bool {
        let Some(bytes) = self.to_bytes() else {
            return false;
        };
        match store.save(REMINDERS_KEY, &bytes) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("failed to persist reminders: {e}");
                false
            }
        }
    }
}

/// `now + minutes`, truncated to the minute.
pub fn snooze_target(now: NaiveDateTime, minutes: u32) -> NaiveDateTime {
    let target = now + Duration::minutes(i64::from(minutes));
    target
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(target)
}

fn clamp_to_day(secs: u64) -> i64 {
    i64::try_from(secs.min(86_400)).unwrap_or(86_400)
}

fn not_found(id: &ReminderId) -> ValidationError {
    ValidationError::NotFound {
        kind: "reminder",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{Delivery, MemoryNotifier};
    use crate::reminder::WeekdaySet;
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;

    /// 2024-03-04 is a Monday.
    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn daily(id: &str, time: &str) -> ReminderDefinition {
        ReminderDefinition::new("Stand up", time.parse().unwrap(), ScheduleKind::Daily)
            .with_id(id)
            .with_message("Stretch your legs")
    }

    fn one_time(id: &str, time: &str, date: NaiveDate) -> ReminderDefinition {
        ReminderDefinition::new("Call", time.parse().unwrap(), ScheduleKind::OneTime(date))
            .with_id(id)
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    #[test]
    fn add_inserts_newest_first_and_rejects_duplicates() {
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        scheduler.add(daily("b", "10:00")).unwrap();
        assert_eq!(scheduler.reminders()[0].id.as_str(), "b");
        assert!(matches!(
            scheduler.add(daily("a", "11:00")),
            Err(ValidationError::Duplicate { .. })
        ));
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn add_rejects_blank_title() {
        let mut scheduler = ReminderScheduler::new();
        let mut def = daily("a", "09:00");
        def.title = "  ".into();
        assert!(scheduler.add(def).is_err());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        let id = ReminderId::from("missing");
        assert!(matches!(
            scheduler.toggle(&id),
            Err(ValidationError::NotFound { .. })
        ));
        assert!(scheduler.remove(&id, &notifier).is_err());
        assert!(scheduler.update(daily("missing", "09:00")).is_err());
        assert!(scheduler.snooze(&id, at(9, 0, 0), &notifier).is_err());
    }

    #[test]
    fn daily_fires_once_within_its_minute() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();

        assert!(scheduler.evaluate(at(8, 59, 55), &notifier).is_empty());
        let fired = scheduler.evaluate(at(9, 0, 0), &notifier);
        assert_eq!(fired.len(), 1);
        scheduler.dismiss(&ReminderId::from("a"), &notifier);
        for s in [10, 20, 30, 40, 50, 59] {
            assert!(scheduler.evaluate(at(9, 0, s), &notifier).is_empty());
        }
        assert_eq!(notifier.notification_count(), 1);
        assert!(scheduler.get(&ReminderId::from("a")).unwrap().enabled);
    }

    #[test]
    fn daily_fires_again_next_day() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        scheduler.evaluate(at(9, 0, 5), &notifier);
        scheduler.dismiss_all(&notifier);

        let tomorrow = at(9, 0, 5) + Duration::days(1);
        assert_eq!(scheduler.evaluate(tomorrow, &notifier).len(), 1);
    }

    #[test]
    fn ringing_reminder_is_not_refired() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        scheduler.evaluate(at(9, 0, 0), &notifier);
        assert!(scheduler.is_ringing(&ReminderId::from("a")));
        assert!(scheduler.ringing()[0].alarm().is_some());

        // Even with the day guard cleared, a ringing reminder stays quiet.
        let mut cleared = scheduler.get(&ReminderId::from("a")).unwrap().clone();
        cleared.last_fired_on = None;
        scheduler.update(cleared).unwrap();
        assert!(scheduler.evaluate(at(9, 0, 30), &notifier).is_empty());
        assert_eq!(scheduler.ringing().len(), 1);
        assert_eq!(notifier.playing().len(), 1);
    }

    #[test]
    fn weekly_fires_only_on_listed_days() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        let def = ReminderDefinition::new(
            "Review",
            "09:00".parse().unwrap(),
            ScheduleKind::Weekly(WeekdaySet::from_days(&[2, 4])),
        )
        .with_id("w");
        scheduler.add(def).unwrap();

        // Monday.
        assert!(scheduler.evaluate(at(9, 0, 0), &notifier).is_empty());
        // Tuesday.
        let tuesday = at(9, 0, 0) + Duration::days(1);
        assert_eq!(scheduler.evaluate(tuesday, &notifier).len(), 1);
    }

    #[test]
    fn disabled_reminder_does_not_fire() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        assert!(!scheduler.toggle(&ReminderId::from("a")).unwrap());
        assert!(scheduler.evaluate(at(9, 0, 0), &notifier).is_empty());
    }

    #[test]
    fn one_time_requires_matching_date() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        let tomorrow = monday().succ_opt().unwrap();
        scheduler.add(one_time("o", "09:00", tomorrow)).unwrap();
        assert!(scheduler.evaluate(at(9, 0, 10), &notifier).is_empty());
    }

    #[test]
    fn one_time_fires_within_window_then_disables() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(one_time("o", "09:00", monday())).unwrap();

        assert!(scheduler.evaluate(at(8, 59, 59), &notifier).is_empty());
        let fired = scheduler.evaluate(at(9, 0, 30), &notifier);
        assert!(matches!(
            fired.as_slice(),
            [Event::ReminderFired { removed: false, .. }]
        ));

        let stored = scheduler.get(&ReminderId::from("o")).unwrap();
        assert!(!stored.enabled);
        assert_eq!(scheduler.len(), 1);

        scheduler.dismiss_all(&notifier);
        assert!(scheduler.evaluate(at(9, 0, 40), &notifier).is_empty());
    }

    #[test]
    fn one_time_outside_window_is_missed() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(one_time("o", "09:00", monday())).unwrap();
        assert!(scheduler.evaluate(at(9, 1, 0), &notifier).is_empty());
        assert!(scheduler.get(&ReminderId::from("o")).unwrap().enabled);
    }

    #[test]
    fn snooze_creates_transient_copy() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        scheduler.evaluate(at(9, 0, 20), &notifier);
        let original = scheduler.get(&ReminderId::from("a")).unwrap().clone();

        let snooze_id = scheduler
            .snooze(&ReminderId::from("a"), at(9, 0, 20), &notifier)
            .unwrap();
        assert!(scheduler.ringing().is_empty());
        assert!(notifier.playing().is_empty());

        let copy = scheduler.get(&snooze_id).unwrap();
        assert!(copy.is_transient_snooze);
        assert_eq!(copy.schedule, ScheduleKind::OneTime(monday()));
        assert_eq!(copy.time.to_string(), "09:05");
        assert_eq!(copy.title, "Stand up");
        assert_eq!(copy.message, "Stretch your legs");
        assert_eq!(scheduler.reminders()[0].id, snooze_id);
        assert_eq!(scheduler.get(&ReminderId::from("a")).unwrap(), &original);
    }

    #[test]
    fn snooze_copy_fires_then_is_removed() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        scheduler.evaluate(at(9, 0, 0), &notifier);
        let snooze_id = scheduler
            .snooze(&ReminderId::from("a"), at(9, 0, 0), &notifier)
            .unwrap();

        assert!(scheduler.evaluate(at(9, 4, 50), &notifier).is_empty());
        let fired = scheduler.evaluate(at(9, 5, 0), &notifier);
        assert!(matches!(
            fired.as_slice(),
            [Event::ReminderFired { removed: true, .. }]
        ));
        assert!(scheduler.get(&snooze_id).is_none());
        assert_eq!(scheduler.len(), 1);

        // The removed copy is still ringing and can be snoozed again.
        let again = scheduler.snooze(&snooze_id, at(9, 5, 0), &notifier).unwrap();
        assert_eq!(scheduler.get(&again).unwrap().time.to_string(), "09:10");
        assert_eq!(notifier.notification_count(), 2);
    }

    #[test]
    fn snooze_across_midnight_moves_date() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "23:58")).unwrap();
        let id = scheduler
            .snooze(&ReminderId::from("a"), at(23, 58, 30), &notifier)
            .unwrap();
        let copy = scheduler.get(&id).unwrap();
        assert_eq!(copy.schedule, ScheduleKind::OneTime(monday().succ_opt().unwrap()));
        assert_eq!(copy.time.to_string(), "00:03");
    }

    #[test]
    fn dismiss_stops_sound() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        scheduler.add(daily("b", "09:00")).unwrap();
        assert_eq!(scheduler.evaluate(at(9, 0, 0), &notifier).len(), 2);
        assert_eq!(notifier.playing().len(), 2);

        assert!(scheduler.dismiss(&ReminderId::from("a"), &notifier).is_some());
        assert!(scheduler.dismiss(&ReminderId::from("a"), &notifier).is_none());
        assert_eq!(notifier.playing().len(), 1);
        assert_eq!(scheduler.dismiss_all(&notifier).len(), 1);
        assert!(notifier.playing().is_empty());
    }

    #[test]
    fn remove_stops_ringing_alarm() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        scheduler.evaluate(at(9, 0, 0), &notifier);
        scheduler.remove(&ReminderId::from("a"), &notifier).unwrap();
        assert!(scheduler.ringing().is_empty());
        assert!(notifier.playing().is_empty());
    }

    #[test]
    fn update_with_new_time_clears_guard() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        scheduler.evaluate(at(9, 0, 0), &notifier);
        scheduler.dismiss_all(&notifier);

        let mut edited = scheduler.get(&ReminderId::from("a")).unwrap().clone();
        edited.time = "09:30".parse().unwrap();
        scheduler.update(edited).unwrap();
        assert_eq!(scheduler.evaluate(at(9, 30, 0), &notifier).len(), 1);
    }

    #[test]
    fn denied_notification_falls_back_to_toast() {
        let notifier = MemoryNotifier::denying(crate::error::NotifyError::PermissionDenied);
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        assert_eq!(scheduler.evaluate(at(9, 0, 0), &notifier).len(), 1);
        assert!(notifier
            .deliveries()
            .iter()
            .any(|d| matches!(d, Delivery::Toast { title, .. } if title == "Stand up")));
    }

    #[test]
    fn persist_and_load_roundtrip() {
        let notifier = MemoryNotifier::new();
        let store = MemoryStore::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        scheduler.add(one_time("o", "12:00", monday())).unwrap();
        scheduler.evaluate(at(9, 0, 0), &notifier);
        assert!(scheduler.persist(&store));

        let loaded = ReminderScheduler::load(&store);
        assert_eq!(loaded.reminders(), scheduler.reminders());
        // The guard survives a restart within the same minute.
        let mut loaded = loaded;
        assert!(loaded.evaluate(at(9, 0, 30), &notifier).is_empty());
    }

    #[test]
    fn load_malformed_list_is_empty() {
        let store = MemoryStore::new();
        store.save(REMINDERS_KEY, b"{oops").unwrap();
        assert!(ReminderScheduler::load(&store).is_empty());
    }

    #[test]
    fn unanswered_daily_fires_again_next_day() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.add(daily("a", "09:00")).unwrap();
        assert_eq!(scheduler.evaluate(at(9, 0, 5), &notifier).len(), 1);

        let tomorrow = at(9, 0, 5) + Duration::seconds(86_400);
        let events = scheduler.evaluate(tomorrow, &notifier);
        assert!(matches!(
            events.as_slice(),
            [Event::ReminderExpired { .. }, Event::ReminderFired { .. }]
        ));
        assert_eq!(scheduler.ringing().len(), 1);
        assert_eq!(scheduler.ringing()[0].fired_at, tomorrow);
        assert_eq!(notifier.playing().len(), 1);
    }

    #[test]
    fn ring_timeout_stops_unanswered_alarm() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.set_ring_timeout_secs(120);
        scheduler.add(daily("a", "09:00")).unwrap();
        scheduler.evaluate(at(9, 0, 0), &notifier);

        assert!(scheduler.evaluate(at(9, 1, 59), &notifier).is_empty());
        assert!(scheduler.is_ringing(&ReminderId::from("a")));

        let events = scheduler.evaluate(at(9, 2, 0), &notifier);
        assert!(matches!(
            events.as_slice(),
            [Event::ReminderExpired { id, fired_at }]
                if id.as_str() == "a" && *fired_at == at(9, 0, 0)
        ));
        assert!(scheduler.ringing().is_empty());
        assert!(notifier.playing().is_empty());
        // The day guard still holds after expiry.
        assert!(scheduler.evaluate(at(9, 2, 10), &notifier).is_empty());
    }

    #[test]
    fn ringing_alarm_expires_at_midnight() {
        let notifier = MemoryNotifier::new();
        let mut scheduler = ReminderScheduler::new();
        scheduler.set_ring_timeout_secs(3_600);
        scheduler.add(daily("a", "23:59")).unwrap();
        scheduler.evaluate(at(23, 59, 0), &notifier);

        let after_midnight = at(23, 59, 0) + Duration::minutes(2);
        let events = scheduler.evaluate(after_midnight, &notifier);
        assert!(matches!(events.as_slice(), [Event::ReminderExpired { .. }]));
        assert!(notifier.playing().is_empty());
    }

    #[test]
    fn merge_keeps_reminders_added_elsewhere() {
        let store = MemoryStore::new();
        let mut mine = ReminderScheduler::new();
        mine.add(daily("a", "09:00")).unwrap();
        assert!(mine.persist(&store));
        mine.mark_synced();

        let mut theirs = ReminderScheduler::load(&store);
        theirs.add(daily("water", "10:00")).unwrap();
        assert!(theirs.persist(&store));

        assert!(mine.refresh(&store));
        let ids: Vec<&str> = mine.reminders().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["water", "a"]);
    }

    #[test]
    fn merge_follows_removal_elsewhere_of_untouched_reminder() {
        let notifier = MemoryNotifier::new();
        let store = MemoryStore::new();
        let mut mine = ReminderScheduler::new();
        mine.add(daily("a", "09:00")).unwrap();
        mine.add(daily("b", "10:00")).unwrap();
        mine.persist(&store);
        mine.mark_synced();

        let mut theirs = ReminderScheduler::load(&store);
        theirs.remove(&ReminderId::from("a"), &notifier).unwrap();
        theirs.persist(&store);

        mine.refresh(&store);
        assert!(mine.get(&ReminderId::from("a")).is_none());
        assert_eq!(mine.len(), 1);
    }

    #[test]
    fn merge_keeps_local_changes() {
        let notifier = MemoryNotifier::new();
        let store = MemoryStore::new();
        let mut mine = ReminderScheduler::new();
        mine.add(daily("a", "09:00")).unwrap();
        mine.add(daily("b", "10:00")).unwrap();
        mine.add(daily("c", "11:00")).unwrap();
        mine.persist(&store);
        mine.mark_synced();

        // Another writer edits a and b, and adds d.
        let mut theirs = ReminderScheduler::load(&store);
        for id in ["a", "b"] {
            let mut edited = theirs.get(&ReminderId::from(id)).unwrap().clone();
            edited.title = "Edited elsewhere".into();
            theirs.update(edited).unwrap();
        }
        theirs.add(daily("d", "12:00")).unwrap();
        theirs.persist(&store);

        // Meanwhile: a is edited, b removed, e added here.
        let mut edited = mine.get(&ReminderId::from("a")).unwrap().clone();
        edited.title = "Edited here".into();
        mine.update(edited).unwrap();
        mine.remove(&ReminderId::from("b"), &notifier).unwrap();
        mine.add(daily("e", "13:00")).unwrap();
        assert!(mine.has_local_changes());

        mine.refresh(&store);
        let ids: Vec<&str> = mine.reminders().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["e", "d", "c", "a"]);
        assert_eq!(mine.get(&ReminderId::from("a")).unwrap().title, "Edited here");

        mine.persist(&store);
        mine.mark_synced();
        assert!(!mine.has_local_changes());
        assert_eq!(ReminderScheduler::load(&store).len(), 4);
    }

    #[test]
    fn refresh_keeps_list_when_stored_document_is_malformed() {
        let store = MemoryStore::new();
        let mut mine = ReminderScheduler::new();
        mine.add(daily("a", "09:00")).unwrap();
        store.save(REMINDERS_KEY, b"{oops").unwrap();
        assert!(!mine.refresh(&store));
        assert_eq!(mine.len(), 1);
    }

    #[test]
    fn snooze_target_truncates_to_minute() {
        assert_eq!(snooze_target(at(9, 0, 59), 5), at(9, 5, 0));
        assert_eq!(snooze_target(at(9, 0, 0), 1), at(9, 1, 0));
    }
}
