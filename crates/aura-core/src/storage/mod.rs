mod autosave;
mod config;
pub mod database;
mod memory;

pub use autosave::{AutoSaveQueue, DEFAULT_DEBOUNCE_MS};
pub use config::{
    AutosaveConfig, Config, LoggingConfig, NotificationsConfig, ReminderConfig, TimerConfig,
};
pub use database::{SessionRecord, SqliteStore, Stats};
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::error::StorageError;

/// Key-value persistence collaborator.
///
/// Values are opaque bytes (JSON in practice). Callers treat every error as
/// non-fatal: they log it and keep their in-memory state.
pub trait PersistentStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn save(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Returns the data directory, creating it if needed.
///
/// `AURA_DATA_DIR` wins when set. Otherwise `~/.config/aura-focus[-dev]/`
/// based on `AURA_ENV` (set `AURA_ENV=dev` to use the development
/// directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let dir = match std::env::var_os("AURA_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("AURA_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("aura-focus-dev")
            } else {
                base_dir.join("aura-focus")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StorageError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
