//! Durable storage contract shared by the file and relational backends.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::WoodchuckConfig;
use crate::errors::{LogResult, RecoveryError};
use crate::log_entry::LogEntry;
use crate::log_store_csv::CsvLogStore;
use crate::log_store_sqlite::SqliteLogStore;

/// Append-only store of log entries.
///
/// Implementations block on I/O; async callers should go through
/// `tokio::task::spawn_blocking`.
pub trait LogStore: Send + Sync {
    /// Persist one entry. Returns only once the entry is durable.
    fn append(&self, entry: &LogEntry) -> LogResult<()>;

    /// Every entry currently stored.
    fn read_all(&self) -> LogResult<Vec<LogEntry>>;

    /// Highest identifier already persisted, used to seed the generator.
    fn recover_last_id(&self) -> Result<u64, RecoveryError>;

    /// Short backend name for logs.
    fn kind(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Csv,
    Sqlite,
}

/// Open the backend selected by configuration.
pub fn open_store(config: &WoodchuckConfig) -> LogResult<Arc<dyn LogStore>> {
    let store: Arc<dyn LogStore> = match config.backend {
        StoreBackend::Csv => Arc::new(CsvLogStore::open(&config.log_dir, &config.log_file)?),
        StoreBackend::Sqlite => Arc::new(SqliteLogStore::open(&config.db_dir, &config.db_file)?),
    };
    tracing::info!(backend = store.kind(), "log store ready");
    Ok(store)
}
