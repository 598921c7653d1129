//! Library root for the `woodchuck` log-ingestion service

// Core error handling
pub mod api_errors;
pub mod errors;

// Records & identifiers
pub mod id_generator;
pub mod log_entry;

// Persistence backends
pub mod log_store;
pub mod log_store_csv;
pub mod log_store_sqlite;

// Ingestion & fan-out
pub mod ingest;
pub mod live_feed;

// Configuration & logging
pub mod config;
pub mod logging;

// Web server interface
pub mod app_state;
pub mod web;

pub use errors::{LogError, LogResult, RecoveryError};
pub use ingest::IngestService;
pub use log_entry::{LogEntry, LogLevel};
pub use log_store::{open_store, LogStore, StoreBackend};
