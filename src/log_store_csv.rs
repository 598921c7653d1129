//! Delimited-file log store.
//!
//! One file per UTC calendar day, named `<YYYY-MM-DD>-<base_name>`, each
//! starting with a fixed header row. Records are appended with a single
//! append-mode write and synced before `append` returns.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{NaiveDate, Utc};
use csv::StringRecord;

use crate::errors::{LogError, LogResult, RecoveryError};
use crate::log_entry::{parse_record_timestamp, LogEntry, LogLevel};
use crate::log_store::LogStore;

pub const CSV_HEADER: [&str; 5] = ["timestamp", "level", "log_id", "user_id", "message"];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug)]
pub struct CsvLogStore {
    dir: PathBuf,
    base_name: String,
    // Held while a day file is created and its header written.
    rollover: Mutex<()>,
}

impl CsvLogStore {
    /// Open the store, creating the directory and today's file if missing.
    pub fn open(dir: impl AsRef<Path>, base_name: &str) -> LogResult<Self> {
        let store = Self {
            dir: dir.as_ref().to_path_buf(),
            base_name: base_name.to_string(),
            rollover: Mutex::new(()),
        };
        let today = store.current_path();
        store.ensure_file(&today)?;
        tracing::info!(path = %today.display(), "csv log store initialized");
        Ok(store)
    }

    /// File holding the records of `date`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}-{}", date.format(DATE_FORMAT), self.base_name))
    }

    pub fn current_path(&self) -> PathBuf {
        self.path_for(Utc::now().date_naive())
    }

    fn ensure_file(&self, path: &Path) -> LogResult<()> {
        let _guard = self.rollover.lock().unwrap_or_else(PoisonError::into_inner);

        if fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false) {
            return Ok(());
        }

        if !self.dir.exists() {
            tracing::info!(dir = %self.dir.display(), "log directory does not exist, creating it");
            fs::create_dir_all(&self.dir)
                .map_err(|e| LogError::persistence("create_directory", e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LogError::persistence("create_file", e))?;

        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        let header = writer
            .into_inner()
            .map_err(|e| LogError::persistence("write_header", e.into_error()))?;

        file.write_all(&header)
            .and_then(|_| file.sync_data())
            .map_err(|e| LogError::persistence("write_header", e))?;
        tracing::debug!(path = %path.display(), "created day file with header");
        Ok(())
    }

    fn encode_record(entry: &LogEntry) -> LogResult<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record([
            entry.record_timestamp().as_str(),
            entry.level.as_upper_str(),
            entry.log_id.to_string().as_str(),
            entry.user_id.as_str(),
            entry.message.as_str(),
        ])?;
        writer
            .into_inner()
            .map_err(|e| LogError::persistence("encode_record", e.into_error()))
    }

    /// Day files present in the directory, oldest first.
    pub fn day_files(&self) -> io::Result<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let suffix = format!("-{}", self.base_name);
        let mut dated = Vec::new();
        for dir_entry in read_dir {
            let dir_entry = dir_entry?;
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            let Some(prefix) = name.strip_suffix(&suffix) else {
                continue;
            };
            if let Ok(date) = NaiveDate::parse_from_str(prefix, DATE_FORMAT) {
                dated.push((date, dir_entry.path()));
            }
        }
        dated.sort_by_key(|(date, _)| *date);
        Ok(dated.into_iter().map(|(_, path)| path).collect())
    }

    fn read_file(path: &Path) -> Result<Vec<LogEntry>, RecoveryError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(RecoveryError::unreadable)?;

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record.map_err(RecoveryError::unreadable)?;
            entries.push(parse_row(&record)?);
        }
        Ok(entries)
    }

    /// Final data record of the newest day file that has one.
    pub fn read_last_entry(&self) -> Result<LogEntry, RecoveryError> {
        let files = self.day_files().map_err(RecoveryError::unreadable)?;
        for path in files.iter().rev() {
            if let Some(last) = Self::read_file(path)?.pop() {
                return Ok(last);
            }
        }
        Err(RecoveryError::Empty)
    }
}

fn parse_row(record: &StringRecord) -> Result<LogEntry, RecoveryError> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let malformed = |reason: String| RecoveryError::Malformed { line, reason };

    if record.len() < CSV_HEADER.len() {
        return Err(malformed(format!(
            "expected {} fields, found {}",
            CSV_HEADER.len(),
            record.len()
        )));
    }

    let timestamp = parse_record_timestamp(&record[0])
        .map_err(|e| malformed(format!("bad timestamp {:?}: {e}", &record[0])))?;
    let level: LogLevel = record[1].parse().map_err(|e| malformed(format!("{e}")))?;
    let log_id = record[2]
        .parse::<u64>()
        .map_err(|e| malformed(format!("bad log_id {:?}: {e}", &record[2])))?;

    Ok(LogEntry::new(log_id, timestamp, level, &record[3], &record[4]))
}

impl LogStore for CsvLogStore {
    fn append(&self, entry: &LogEntry) -> LogResult<()> {
        let path = self.path_for(entry.timestamp.date_naive());
        self.ensure_file(&path)?;

        let bytes = Self::encode_record(entry)?;
        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| LogError::persistence("open_for_append", e))?;
        file.write_all(&bytes)
            .map_err(|e| LogError::persistence("append_record", e))?;
        file.sync_data()
            .map_err(|e| LogError::persistence("sync_record", e))?;
        Ok(())
    }

    fn read_all(&self) -> LogResult<Vec<LogEntry>> {
        let files = self
            .day_files()
            .map_err(|e| LogError::persistence("list_day_files", e))?;
        let mut all = Vec::new();
        for path in files {
            let entries =
                Self::read_file(&path).map_err(|e| LogError::persistence("read_all", e))?;
            all.extend(entries);
        }
        Ok(all)
    }

    // Ids are drawn before the clock is read, so the highest id can sit in an
    // older day file than the newest record. Every file is scanned.
    fn recover_last_id(&self) -> Result<u64, RecoveryError> {
        let files = self.day_files().map_err(RecoveryError::unreadable)?;
        let mut highest: Option<u64> = None;
        for path in &files {
            let file_max = Self::read_file(path)?.iter().map(|e| e.log_id).max();
            highest = highest.max(file_max);
        }
        highest.ok_or(RecoveryError::Empty)
    }

    fn kind(&self) -> &'static str {
        "csv"
    }
}
