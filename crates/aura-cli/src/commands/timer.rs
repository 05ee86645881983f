use clap::{Subcommand, ValueEnum};

use aura_core::{App, Event};

use super::{open_app, print_event, CliResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Start when paused, pause when running
    Toggle,
    /// Back to an idle work session
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Set the work duration in minutes
    SetWork {
        minutes: u32,
    },
    /// Set the break duration in minutes
    SetBreak {
        minutes: u32,
    },
    /// Turn the completion alarm on or off
    Alarm {
        #[arg(value_enum)]
        state: Switch,
    },
}

pub fn run(action: TimerAction) -> CliResult {
    let mut app = open_app()?;

    // Apply time that passed since the last command first; a session that
    // ran out in the meantime completes here.
    if let Some(event) = app.tick_timer() {
        print_event(&event)?;
    }

    let result = match action {
        TimerAction::Start => {
            let event = app.timer_start();
            print_or_state(&app, event)
        }
        TimerAction::Pause => {
            let event = app.timer_pause();
            print_or_state(&app, event)
        }
        TimerAction::Toggle => {
            let event = app.timer_toggle();
            print_or_state(&app, event)
        }
        TimerAction::Reset => print_event(&app.timer_reset()),
        TimerAction::Status => print_event(&app.timer_state()),
        TimerAction::SetWork { minutes } => match app.set_work_duration(minutes) {
            Ok(event) => print_event(&event),
            Err(e) => Err(e.into()),
        },
        TimerAction::SetBreak { minutes } => match app.set_break_duration(minutes) {
            Ok(event) => print_event(&event),
            Err(e) => Err(e.into()),
        },
        TimerAction::Alarm { state } => {
            print_event(&app.set_alarm_enabled(matches!(state, Switch::On)))
        }
    };

    app.shutdown();
    result
}

/// Commands that were no-ops (start while running) print the state instead.
fn print_or_state(app: &App, event: Option<Event>) -> CliResult {
    match event {
        Some(event) => print_event(&event),
        None => print_event(&app.timer_state()),
    }
}
