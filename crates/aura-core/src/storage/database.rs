//! SQLite-backed persistent store.
//!
//! Provides persistent storage for:
//! - Key-value application state (timer snapshot, reminder list)
//! - Completed focus sessions and their statistics

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{data_dir, PersistentStore};
use crate::error::StorageError;
use crate::timer::TimerMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub mode: TimerMode,
    pub duration_min: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_sessions: u64,
    pub total_work_min: u64,
    pub total_break_min: u64,
    pub completed_work_sessions: u64,
    pub today_work_sessions: u64,
    pub today_work_min: u64,
}

/// SQLite database holding the kv table and session history.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the store at `<data_dir>/aura.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("aura.db");
        Self::open_at(&path)
    }

    /// Open the store at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Locked)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                mode         TEXT NOT NULL,
                duration_min INTEGER NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);",
        )?;
        Ok(())
    }

    /// Record a completed timer phase.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(
        &self,
        mode: TimerMode,
        duration_min: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (mode, duration_min, completed_at) VALUES (?1, ?2, ?3)",
            params![mode.as_str(), duration_min, completed_at.to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, mode, duration_min, completed_at
             FROM sessions
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, mode, duration_min, completed_at) = row?;
            let mode = if mode == "break" {
                TimerMode::Break
            } else {
                TimerMode::Work
            };
            let completed_at = DateTime::parse_from_rfc3339(&completed_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
            sessions.push(SessionRecord {
                id,
                mode,
                duration_min,
                completed_at,
            });
        }
        Ok(sessions)
    }

    /// Statistics over all sessions; "today" starts at local midnight.
    pub fn stats(&self) -> Result<Stats, StorageError> {
        let midnight = Local::now()
            .date_naive()
            .and_time(NaiveTime::MIN);
        let since = Local
            .from_local_datetime(&midnight)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        self.stats_since(since)
    }

    /// Statistics over all sessions, with "today" meaning `since` onwards.
    pub fn stats_since(&self, since: DateTime<Utc>) -> Result<Stats, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT mode, COUNT(*), COALESCE(SUM(duration_min), 0)
             FROM sessions
             GROUP BY mode",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut stats = Stats::default();
        for row in rows {
            let (mode, count, minutes) = row?;
            stats.total_sessions += count;
            match mode.as_str() {
                "work" => {
                    stats.completed_work_sessions += count;
                    stats.total_work_min += minutes;
                }
                "break" => {
                    stats.total_break_min += minutes;
                }
                _ => {}
            }
        }

        let (today_count, today_min) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_min), 0)
             FROM sessions
             WHERE mode = 'work' AND completed_at >= ?1",
            params![since.to_rfc3339()],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        stats.today_work_sessions = today_count;
        stats.today_work_min = today_min;

        Ok(stats)
    }
}

impl PersistentStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}
