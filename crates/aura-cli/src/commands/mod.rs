pub mod config;
pub mod reminder;
pub mod run;
pub mod stats;
pub mod timer;

use std::sync::Arc;

use aura_core::{App, Config, Event, SqliteStore, SystemClock};
use serde::Serialize;

use crate::notifier::TerminalNotifier;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the store and build the application context from persisted state.
pub fn open_app() -> Result<App, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = Arc::new(SqliteStore::open()?);
    let notifier = Arc::new(TerminalNotifier::from_config(&config.notifications));
    let app = App::load(store.clone(), notifier, Arc::new(SystemClock), config)
        .with_session_log(store);
    Ok(app)
}

/// One event per line.
pub fn print_event(event: &Event) -> CliResult {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
