use chrono::NaiveDate;
use clap::{Args, Subcommand};

use aura_core::{
    App, ReminderCategory, ReminderDefinition, ReminderId, ScheduleKind, TimeOfDay, WeekdaySet,
};

use super::{open_app, print_event, print_json, CliResult};

#[derive(Args)]
pub struct ScheduleArgs {
    /// Weekdays, e.g. "mon,wed", "1,3", "weekdays" (0 = Sunday)
    #[arg(long, conflicts_with = "date")]
    days: Option<String>,
    /// One-time date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,
}

impl ScheduleArgs {
    fn is_set(&self) -> bool {
        self.days.is_some() || self.date.is_some()
    }

    fn parse(&self) -> Result<ScheduleKind, Box<dyn std::error::Error>> {
        if let Some(date) = &self.date {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| format!("invalid date '{date}': {e}"))?;
            return Ok(ScheduleKind::OneTime(date));
        }
        match &self.days {
            Some(days) => Ok(ScheduleKind::Weekly(days.parse::<WeekdaySet>()?).normalized()),
            None => Ok(ScheduleKind::Daily),
        }
    }
}

#[derive(Subcommand)]
pub enum ReminderAction {
    /// Add a reminder (daily unless --days or --date is given)
    Add {
        /// Reminder title
        title: String,
        /// Time of day (HH:MM)
        #[arg(long)]
        time: String,
        #[command(flatten)]
        schedule: ScheduleArgs,
        /// Notification body
        #[arg(long, default_value = "")]
        message: String,
        /// general, task, habit, break, hydration or custom
        #[arg(long, default_value = "general")]
        category: String,
    },
    /// Edit an existing reminder
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[command(flatten)]
        schedule: ScheduleArgs,
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List reminders
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a reminder
    Remove { id: String },
    /// Enable or disable a reminder
    Toggle { id: String },
    /// Snooze a reminder for the configured number of minutes
    Snooze { id: String },
    /// Stop a ringing reminder
    Dismiss { id: String },
    /// Fire every reminder due right now
    Check,
}

pub fn run(action: ReminderAction) -> CliResult {
    let mut app = open_app()?;
    let result = dispatch(&app, action);
    app.shutdown();
    result
}

fn dispatch(app: &App, action: ReminderAction) -> CliResult {
    match action {
        ReminderAction::Add {
            title,
            time,
            schedule,
            message,
            category,
        } => {
            let definition = ReminderDefinition::new(title, time.parse()?, schedule.parse()?)
                .with_message(message)
                .with_category(category.parse::<ReminderCategory>()?);
            let id = app.add_reminder(definition)?;
            if let Some(added) = app.reminder(&id) {
                print_json(&added)?;
            }
        }
        ReminderAction::Edit {
            id,
            title,
            time,
            schedule,
            message,
            category,
        } => {
            let id = ReminderId::from(id);
            let mut definition = app
                .reminder(&id)
                .ok_or_else(|| format!("no reminder with id '{id}'"))?;
            if let Some(title) = title {
                definition.title = title;
            }
            if let Some(time) = time {
                definition.time = time.parse::<TimeOfDay>()?;
            }
            if schedule.is_set() {
                definition.schedule = schedule.parse()?;
            }
            if let Some(message) = message {
                definition.message = message;
            }
            if let Some(category) = category {
                definition.category = category.parse()?;
            }
            app.update_reminder(definition)?;
            if let Some(updated) = app.reminder(&id) {
                print_json(&updated)?;
            }
        }
        ReminderAction::List { json } => {
            let reminders = app.reminders();
            if json {
                print_json(&reminders)?;
            } else if reminders.is_empty() {
                println!("No reminders.");
            } else {
                for r in &reminders {
                    println!(
                        "{}  {}  {:<20} {:<9} {:<3} {}",
                        r.id,
                        r.time,
                        r.schedule.describe(),
                        r.category.label(),
                        if r.enabled { "on" } else { "off" },
                        r.title
                    );
                }
            }
        }
        ReminderAction::Remove { id } => {
            let removed = app.remove_reminder(&ReminderId::from(id))?;
            println!("Removed reminder: {}", removed.title);
        }
        ReminderAction::Toggle { id } => {
            let enabled = app.toggle_reminder(&ReminderId::from(id.as_str()))?;
            println!("{id}: {}", if enabled { "enabled" } else { "disabled" });
        }
        ReminderAction::Snooze { id } => {
            print_event(&app.snooze_reminder(&ReminderId::from(id))?)?;
        }
        ReminderAction::Dismiss { id } => match app.dismiss_reminder(&ReminderId::from(id.as_str())) {
            Some(event) => print_event(&event)?,
            None => println!("{id} is not ringing"),
        },
        ReminderAction::Check => {
            for event in app.poll_reminders() {
                print_event(&event)?;
            }
        }
    }
    Ok(())
}
