use clap::Subcommand;
use aura_core::SqliteStore;
use serde_json::json;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats
    Today,
    /// All-time stats
    All,
    /// Most recent completed sessions
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

pub fn run(action: StatsAction) -> super::CliResult {
    let db = SqliteStore::open()?;

    match action {
        StatsAction::Today => {
            let stats = db.stats()?;
            super::print_json(&json!({
                "work_sessions": stats.today_work_sessions,
                "work_min": stats.today_work_min,
            }))?;
        }
        StatsAction::All => {
            let stats = db.stats()?;
            super::print_json(&stats)?;
        }
        StatsAction::Recent { limit } => {
            let sessions = db.recent_sessions(limit)?;
            super::print_json(&sessions)?;
        }
    }
    Ok(())
}
