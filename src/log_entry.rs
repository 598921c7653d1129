// log_entry.rs
// Purpose: The immutable unit of record flowing through the ingestion pipeline

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::InvalidLevel;

/// Timestamp layout used by the delimited-file store.
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// LogLevel is the closed set of severities a submitter may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Upper-cased form written to the delimited-file store.
    pub fn as_upper_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Strict parse for submitted values: only the lowercase names are accepted.
    pub fn from_wire(s: &str) -> Result<Self, InvalidLevel> {
        match s {
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(InvalidLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = InvalidLevel;

    // Case-insensitive so the upper-cased file representation reads back.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(InvalidLevel(s.to_string())),
        }
    }
}

/// LogEntry is one persisted record with its assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub log_id: u64,
    pub level: LogLevel,
    pub user_id: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(
        log_id: u64,
        timestamp: DateTime<Utc>,
        level: LogLevel,
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            log_id,
            level,
            user_id: user_id.into(),
            message: message.into(),
        }
    }

    /// Timestamp rendered the way the delimited-file store keeps it.
    pub fn record_timestamp(&self) -> String {
        self.timestamp.format(RECORD_TIME_FORMAT).to_string()
    }
}

/// Parse a timestamp previously written with [`RECORD_TIME_FORMAT`].
pub fn parse_record_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, RECORD_TIME_FORMAT).map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn level_parses_known_values_only() {
        assert_eq!("info".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("Error".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert!("debug".parse::<LogLevel>().is_err());
        assert!("warning".parse::<LogLevel>().is_err());
        assert!("".parse::<LogLevel>().is_err());
    }

    #[test]
    fn wire_level_is_lowercase_only() {
        assert_eq!(LogLevel::from_wire("warn"), Ok(LogLevel::Warn));
        assert!(LogLevel::from_wire("INFO").is_err());
        assert!(LogLevel::from_wire("Error").is_err());
        assert!(LogLevel::from_wire(" info").is_err());
    }

    #[test]
    fn entry_serializes_with_wire_field_names() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let entry = LogEntry::new(7, ts, LogLevel::Warn, "10.0.0.5", "disk at 91%");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["log_id"], 7);
        assert_eq!(json["level"], "warn");
        assert_eq!(json["user_id"], "10.0.0.5");
        assert_eq!(json["message"], "disk at 91%");
        assert_eq!(json["timestamp"], "2024-03-09T14:05:00Z");
    }

    #[test]
    fn record_timestamp_reads_back() {
        let ts = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let entry = LogEntry::new(1, ts, LogLevel::Info, "u", "m");
        assert_eq!(entry.record_timestamp(), "2023-12-31T23:59:59Z");
        assert_eq!(parse_record_timestamp(&entry.record_timestamp()).unwrap(), ts);
    }
}
