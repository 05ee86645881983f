//! Reminder definitions and their stored JSON shape.
//!
//! In memory a reminder's schedule is a [`ScheduleKind`] sum type. On disk
//! the older flat shape is kept (`days` list, `isOneTime` flag, `date`
//! string) so lists written by earlier releases load unchanged; the
//! conversion lives in [`ReminderRecord`].

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Reminder identifier.
///
/// New reminders get a UUID v4. Ids written by earlier releases (numeric
/// timestamps) are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(String);

impl ReminderId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReminderId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ReminderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ReminderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local wall-clock time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::invalid(
                "time",
                format!("{hour:02}:{minute:02} is not a valid time of day"),
            ));
        }
        Ok(Self { hour, minute })
    }

    /// Truncate a wall-clock time to its minute.
    pub fn from_naive(time: NaiveTime) -> Self {
        use chrono::Timelike;
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn to_naive(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }

    /// This time of day on `date`.
    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.to_naive())
    }

    /// Whether `now` falls inside this minute.
    pub fn matches(self, now: NaiveDateTime) -> bool {
        TimeOfDay::from_naive(now.time()) == self
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    /// Parse `HH:MM` (a single-digit hour is accepted).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::invalid("time", format!("expected HH:MM, got '{s}'"));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour = h.parse::<u8>().map_err(|_| invalid())?;
        let minute = m.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Set of weekdays, numbered 0 = Sunday through 6 = Saturday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);
    pub const ALL: WeekdaySet = WeekdaySet(0b111_1111);
    pub const WEEKDAYS: WeekdaySet = WeekdaySet(0b011_1110);
    pub const WEEKENDS: WeekdaySet = WeekdaySet(0b100_0001);

    /// Build from day numbers; numbers above 6 are ignored.
    pub fn from_days(days: &[u8]) -> Self {
        let mut bits = 0u8;
        for &day in days {
            if day <= 6 {
                bits |= 1 << day;
            } else {
                tracing::warn!("ignoring out-of-range weekday {day}");
            }
        }
        Self(bits)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_sunday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_sunday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Day numbers in ascending order.
    pub fn days(&self) -> Vec<u8> {
        (0..7).filter(|d| self.0 & (1 << d) != 0).collect()
    }
}

impl FromStr for WeekdaySet {
    type Err = ValidationError;

    /// Parse a comma-separated list of day names (`mon,wed`) or numbers
    /// (`1,3`), or one of `weekdays`, `weekends`, `all`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekdays" => return Ok(Self::WEEKDAYS),
            "weekends" => return Ok(Self::WEEKENDS),
            "all" | "every" => return Ok(Self::ALL),
            _ => {}
        }
        let mut set = Self::EMPTY;
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let day = match part.parse::<u8>() {
                Ok(n) if n <= 6 => n,
                Ok(_) => {
                    return Err(ValidationError::invalid(
                        "days",
                        format!("day number must be 0-6, got {part}"),
                    ))
                }
                Err(_) => part
                    .parse::<Weekday>()
                    .map(|d| d.num_days_from_sunday() as u8)
                    .map_err(|_| {
                        ValidationError::invalid("days", format!("unknown weekday '{part}'"))
                    })?,
            };
            set.0 |= 1 << day;
        }
        Ok(set)
    }
}

/// When a reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    /// Every day at the reminder time.
    Daily,
    /// On the listed weekdays at the reminder time.
    Weekly(WeekdaySet),
    /// Once, on the given local date.
    OneTime(NaiveDate),
}

impl ScheduleKind {
    /// Weekly with no days means every day.
    pub fn normalized(self) -> Self {
        match self {
            ScheduleKind::Weekly(days) if days.is_empty() => ScheduleKind::Daily,
            other => other,
        }
    }

    pub fn is_one_time(&self) -> bool {
        matches!(self, ScheduleKind::OneTime(_))
    }

    /// Whether the schedule applies on `date`, ignoring the time of day.
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        match self {
            ScheduleKind::Daily => true,
            ScheduleKind::Weekly(days) => days.is_empty() || days.contains(date.weekday()),
            ScheduleKind::OneTime(on) => *on == date,
        }
    }

    /// Human-readable summary, e.g. `Weekdays` or `Mon, Wed`.
    pub fn describe(&self) -> String {
        match self {
            ScheduleKind::Daily => "Daily".to_string(),
            ScheduleKind::OneTime(date) => format!("One-time on {}", date.format("%Y-%m-%d")),
            ScheduleKind::Weekly(days) => {
                if days.is_empty() {
                    "Daily".to_string()
                } else if *days == WeekdaySet::ALL {
                    "Every day".to_string()
                } else if *days == WeekdaySet::WEEKDAYS {
                    "Weekdays".to_string()
                } else if *days == WeekdaySet::WEEKENDS {
                    "Weekends".to_string()
                } else {
                    days.days()
                        .iter()
                        .map(|&d| DAY_NAMES[usize::from(d)])
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            }
        }
    }
}

/// What the reminder is about. Only affects presentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderCategory {
    #[default]
    General,
    Task,
    Habit,
    Break,
    Hydration,
    Custom,
}

impl ReminderCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderCategory::General => "general",
            ReminderCategory::Task => "task",
            ReminderCategory::Habit => "habit",
            ReminderCategory::Break => "break",
            ReminderCategory::Hydration => "hydration",
            ReminderCategory::Custom => "custom",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReminderCategory::General => "General",
            ReminderCategory::Task => "Task",
            ReminderCategory::Habit => "Habit",
            ReminderCategory::Break => "Break",
            ReminderCategory::Hydration => "Hydration",
            ReminderCategory::Custom => "Custom",
        }
    }
}

impl FromStr for ReminderCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(ReminderCategory::General),
            "task" => Ok(ReminderCategory::Task),
            "habit" => Ok(ReminderCategory::Habit),
            "break" => Ok(ReminderCategory::Break),
            "hydration" => Ok(ReminderCategory::Hydration),
            "custom" => Ok(ReminderCategory::Custom),
            other => Err(ValidationError::invalid(
                "category",
                format!("unknown category '{other}'"),
            )),
        }
    }
}

impl fmt::Display for ReminderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-defined reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ReminderRecord", into = "ReminderRecord")]
pub struct ReminderDefinition {
    pub id: ReminderId,
    pub title: String,
    pub message: String,
    pub category: ReminderCategory,
    pub time: TimeOfDay,
    pub schedule: ScheduleKind,
    pub enabled: bool,
    /// Snooze copies are deleted after they fire.
    pub is_transient_snooze: bool,
    /// Local date of the last firing; guards against firing twice a day.
    pub last_fired_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl ReminderDefinition {
    /// New enabled reminder with a fresh id.
    pub fn new(title: impl Into<String>, time: TimeOfDay, schedule: ScheduleKind) -> Self {
        Self {
            id: ReminderId::new(),
            title: title.into(),
            message: String::new(),
            category: ReminderCategory::default(),
            time,
            schedule: schedule.normalized(),
            enabled: true,
            is_transient_snooze: false,
            last_fired_on: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_category(mut self, category: ReminderCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_id(mut self, id: impl Into<ReminderId>) -> Self {
        self.id = id.into();
        self
    }

    /// Check user-editable fields and normalize the schedule.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::invalid("title", "must not be empty"));
        }
        self.schedule = self.schedule.normalized();
        Ok(())
    }
}

/// Stored JSON shape of a reminder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRecord {
    id: RecordId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    category: ReminderCategory,
    time: String,
    #[serde(default)]
    days: Vec<u8>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "isOneTime")]
    is_one_time: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(default, rename = "isSnooze")]
    is_snooze: bool,
    #[serde(default, rename = "lastFiredOn", skip_serializing_if = "Option::is_none")]
    last_fired_on: Option<NaiveDate>,
}

/// Ids were numeric timestamps in some older lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RecordId {
    Text(String),
    Number(u64),
}

fn default_true() -> bool {
    true
}

impl TryFrom<ReminderRecord> for ReminderDefinition {
    type Error = ValidationError;

    fn try_from(record: ReminderRecord) -> Result<Self, Self::Error> {
        let id = match record.id {
            RecordId::Text(s) if !s.is_empty() => ReminderId::from(s),
            RecordId::Text(_) => return Err(ValidationError::invalid("id", "must not be empty")),
            RecordId::Number(n) => ReminderId::from(n.to_string()),
        };
        let time: TimeOfDay = record.time.parse()?;
        let date = record.date.filter(|d| !d.trim().is_empty());

        let schedule = if record.is_one_time {
            let date = date.ok_or_else(|| {
                ValidationError::invalid("date", "one-time reminder without a date")
            })?;
            let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|e| {
                ValidationError::invalid("date", format!("'{date}' is not YYYY-MM-DD: {e}"))
            })?;
            ScheduleKind::OneTime(date)
        } else {
            ScheduleKind::Weekly(WeekdaySet::from_days(&record.days)).normalized()
        };

        let mut definition = ReminderDefinition {
            id,
            title: record.title,
            message: record.message,
            category: record.category,
            time,
            schedule,
            enabled: record.enabled,
            is_transient_snooze: record.is_snooze,
            last_fired_on: record.last_fired_on,
            created_at: record.created_at.unwrap_or_default(),
        };
        definition.validate()?;
        Ok(definition)
    }
}

impl From<ReminderDefinition> for ReminderRecord {
    fn from(def: ReminderDefinition) -> Self {
        let (days, is_one_time, date) = match def.schedule {
            ScheduleKind::Daily => (Vec::new(), false, None),
            ScheduleKind::Weekly(days) => (days.days(), false, None),
            ScheduleKind::OneTime(date) => {
                (Vec::new(), true, Some(date.format("%Y-%m-%d").to_string()))
            }
        };
        ReminderRecord {
            id: RecordId::Text(def.id.0),
            title: def.title,
            message: def.message,
            category: def.category,
            time: def.time.to_string(),
            days,
            enabled: def.enabled,
            created_at: Some(def.created_at),
            is_one_time,
            date,
            is_snooze: def.is_transient_snooze,
            last_fired_on: def.last_fired_on,
        }
    }
}

/// Parse a stored reminder list.
///
/// Elements that fail to parse are skipped with a warning; a document that
/// is not a JSON array yields an empty list.
pub fn parse_reminder_list(bytes: &[u8]) -> Vec<ReminderDefinition> {
    parse_reminder_document(bytes).unwrap_or_default()
}

/// Like [`parse_reminder_list`], but `None` when the document itself is not
/// a JSON array.
pub fn parse_reminder_document(bytes: &[u8]) -> Option<Vec<ReminderDefinition>> {
    let values: Vec<serde_json::Value> = match serde_json::from_slice(bytes) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!("discarding malformed reminder list: {e}");
            return None;
        }
    };

    let mut reminders: Vec<ReminderDefinition> = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<ReminderDefinition>(value) {
            Ok(def) if reminders.iter().any(|r| r.id == def.id) => {
                tracing::warn!("skipping reminder #{index}: duplicate id {}", def.id);
            }
            Ok(def) => reminders.push(def),
            Err(e) => tracing::warn!("skipping malformed reminder #{index}: {e}"),
        }
    }
    Some(reminders)
}
