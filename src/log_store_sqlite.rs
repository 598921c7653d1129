//! SQLite-backed log store: one `logs` table, one row per entry.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::{LogError, LogResult, RecoveryError};
use crate::log_entry::{LogEntry, LogLevel};
use crate::log_store::LogStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS logs (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT    NOT NULL,
    timestamp  TEXT    NOT NULL,
    level      TEXT    NOT NULL,
    log_id     INTEGER NOT NULL,
    user_id    TEXT    NOT NULL,
    message    TEXT    NOT NULL
);
";

pub struct SqliteLogStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteLogStore {
    /// Open (or create) the database file and migrate the schema.
    pub fn open(dir: impl AsRef<Path>, file_name: &str) -> LogResult<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            tracing::info!(dir = %dir.display(), "database directory does not exist, creating it");
            fs::create_dir_all(dir).map_err(|e| LogError::persistence("create_directory", e))?;
        }

        let path = dir.join(file_name);
        tracing::info!(path = %path.display(), "initializing database");
        let conn = Connection::open(&path).map_err(|e| LogError::persistence("open_database", e))?;
        Self::from_connection(conn, path)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> LogResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LogError::persistence("open_database", e))?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, path: PathBuf) -> LogResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| LogError::persistence("migrate_schema", e))?;
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> LogResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LogError::internal("sqlite connection mutex poisoned"))
    }
}

fn conversion_failure(
    column: usize,
    ty: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, ty, Box::new(err))
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
    let timestamp: String = row.get(0)?;
    let level: String = row.get(1)?;
    let log_id: i64 = row.get(2)?;

    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_failure(0, Type::Text, e))?;
    let level: LogLevel = level
        .parse()
        .map_err(|e| conversion_failure(1, Type::Text, e))?;
    let log_id = u64::try_from(log_id).map_err(|e| conversion_failure(2, Type::Integer, e))?;

    Ok(LogEntry::new(
        log_id,
        timestamp,
        level,
        row.get::<_, String>(3)?,
        row.get::<_, String>(4)?,
    ))
}

impl LogStore for SqliteLogStore {
    fn append(&self, entry: &LogEntry) -> LogResult<()> {
        let log_id = i64::try_from(entry.log_id)
            .map_err(|e| LogError::persistence("insert_log", e))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO logs (created_at, timestamp, level, log_id, user_id, message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Utc::now().to_rfc3339(),
                entry.timestamp.to_rfc3339(),
                entry.level.as_str(),
                log_id,
                entry.user_id,
                entry.message,
            ],
        )
        .map_err(|e| LogError::persistence("insert_log", e))?;
        Ok(())
    }

    fn read_all(&self) -> LogResult<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT timestamp, level, log_id, user_id, message FROM logs")
            .map_err(|e| LogError::persistence("select_logs", e))?;
        let rows = stmt
            .query_map([], row_to_entry)
            .map_err(|e| LogError::persistence("select_logs", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| LogError::persistence("select_logs", e))
    }

    fn recover_last_id(&self) -> Result<u64, RecoveryError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let max: Option<i64> = conn
            .query_row("SELECT MAX(log_id) FROM logs", [], |row| row.get(0))
            .optional()
            .map_err(RecoveryError::unreadable)?
            .flatten();
        match max {
            None => Err(RecoveryError::Empty),
            Some(id) => u64::try_from(id).map_err(|e| RecoveryError::Malformed {
                line: 0,
                reason: format!("negative log_id {id}: {e}"),
            }),
        }
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn entry(id: u64, level: LogLevel) -> LogEntry {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, id as u32).unwrap();
        LogEntry::new(id, ts, level, "192.168.1.20", format!("entry {id}"))
    }

    #[test]
    fn insert_and_scan_roundtrip() {
        let store = SqliteLogStore::in_memory().unwrap();
        store.append(&entry(1, LogLevel::Info)).unwrap();
        store.append(&entry(2, LogLevel::Error)).unwrap();

        let mut all = store.read_all().unwrap();
        all.sort_by_key(|e| e.log_id);
        assert_eq!(all, vec![entry(1, LogLevel::Info), entry(2, LogLevel::Error)]);
    }

    #[test]
    fn recover_reports_empty_then_max() {
        let store = SqliteLogStore::in_memory().unwrap();
        assert!(matches!(store.recover_last_id(), Err(RecoveryError::Empty)));

        store.append(&entry(9, LogLevel::Warn)).unwrap();
        store.append(&entry(7, LogLevel::Warn)).unwrap();
        assert_eq!(store.recover_last_id().unwrap(), 9);
    }

    #[test]
    fn reopening_keeps_rows() {
        let dir = tempdir().unwrap();
        let db_dir = dir.path().join("db");
        {
            let store = SqliteLogStore::open(&db_dir, "logs.db").unwrap();
            store.append(&entry(1, LogLevel::Info)).unwrap();
            assert!(store.path().ends_with("logs.db"));
        }
        let store = SqliteLogStore::open(&db_dir, "logs.db").unwrap();
        assert_eq!(store.read_all().unwrap().len(), 1);
        assert_eq!(store.recover_last_id().unwrap(), 1);
    }
}
