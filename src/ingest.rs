//! ingest.rs
//! Validation, identifier assignment, persistence and fan-out of submitted
//! log entries.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};

use crate::errors::{LogError, LogResult, RecoveryError};
use crate::id_generator::LogIdGenerator;
use crate::live_feed::LiveFeed;
use crate::log_entry::{LogEntry, LogLevel};
use crate::log_store::LogStore;

pub struct IngestService {
    ids: LogIdGenerator,
    store: Arc<dyn LogStore>,
    feed: Option<LiveFeed>,
}

impl IngestService {
    pub fn new(ids: LogIdGenerator, store: Arc<dyn LogStore>, feed: Option<LiveFeed>) -> Self {
        Self { ids, store, feed }
    }

    /// Build a service whose generator resumes above the highest identifier
    /// already in `store`. An unrecoverable store seeds at zero.
    pub async fn recover(store: Arc<dyn LogStore>, feed: Option<LiveFeed>) -> LogResult<Self> {
        let seed = seed_from_store(Arc::clone(&store)).await?;
        Ok(Self::new(LogIdGenerator::new(seed), store, feed))
    }

    pub fn feed(&self) -> Option<&LiveFeed> {
        self.feed.as_ref()
    }

    pub fn last_issued_id(&self) -> u64 {
        self.ids.current()
    }

    /// Validate, assign an identifier, persist, then broadcast.
    ///
    /// An identifier drawn for an entry whose append fails is not reused.
    /// Persisting and broadcasting run together on the blocking pool, so a
    /// caller that goes away mid-append does not cost subscribers the entry.
    pub async fn submit(&self, remote_id: &str, level: &str, message: &str) -> LogResult<LogEntry> {
        let level = validate(remote_id, level, message)?;

        let log_id = self.ids.next_id();
        let entry = LogEntry::new(log_id, Utc::now().trunc_subsecs(0), level, remote_id, message);

        let store = Arc::clone(&self.store);
        let feed = self.feed.clone();
        let to_store = entry.clone();
        tokio::task::spawn_blocking(move || {
            store.append(&to_store).inspect_err(|e| {
                tracing::error!(
                    log_id,
                    error = %e,
                    backend = store.kind(),
                    "failed to persist log entry"
                );
            })?;
            if let Some(feed) = &feed {
                feed.publish(&to_store);
            }
            Ok::<_, LogError>(())
        })
        .await
        .map_err(|e| LogError::internal(format!("append task failed: {e}")))??;

        tracing::debug!(log_id, level = %entry.level, user_id = %entry.user_id, "log entry stored");
        Ok(entry)
    }

    /// Every persisted entry, as stored.
    pub async fn list_all(&self) -> LogResult<Vec<LogEntry>> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.read_all())
            .await
            .map_err(|e| LogError::internal(format!("read task failed: {e}")))?
            .inspect_err(|e| tracing::error!(error = %e, "failed to read log entries"))
    }
}

fn validate(remote_id: &str, level: &str, message: &str) -> LogResult<LogLevel> {
    if level.is_empty() {
        return Err(LogError::validation("level", "The level is required"));
    }
    let level = LogLevel::from_wire(level)
        .map_err(|e| LogError::validation("level", format!("{e}")))?;
    if message.is_empty() {
        return Err(LogError::validation("message", "The message is required"));
    }
    if remote_id.is_empty() {
        return Err(LogError::validation("user_id", "The remote address is unknown"));
    }
    Ok(level)
}

async fn seed_from_store(store: Arc<dyn LogStore>) -> LogResult<Option<u64>> {
    let kind = store.kind();
    let recovered = tokio::task::spawn_blocking(move || store.recover_last_id())
        .await
        .map_err(|e| LogError::internal(format!("recovery task failed: {e}")))?;

    Ok(match recovered {
        Ok(last) => {
            tracing::info!(last_log_id = last, backend = kind, "resuming log ids");
            Some(last)
        }
        Err(RecoveryError::Empty) => {
            tracing::info!(backend = kind, "log store is empty, starting ids at 1");
            None
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                backend = kind,
                "could not recover last log id; starting at 1, ids may collide with stored entries"
            );
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Mutex};
    use std::time::Duration;

    /// In-memory store whose appends can be made to fail.
    #[derive(Default)]
    struct MemoryStore {
        entries: Mutex<Vec<LogEntry>>,
        fail_appends: bool,
    }

    impl LogStore for MemoryStore {
        fn append(&self, entry: &LogEntry) -> LogResult<()> {
            if self.fail_appends {
                return Err(LogError::persistence(
                    "append",
                    std::io::Error::new(std::io::ErrorKind::Other, "disk unplugged"),
                ));
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }

        fn read_all(&self) -> LogResult<Vec<LogEntry>> {
            Ok(self.entries.lock().unwrap().clone())
        }

        fn recover_last_id(&self) -> Result<u64, RecoveryError> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.log_id)
                .max()
                .ok_or(RecoveryError::Empty)
        }

        fn kind(&self) -> &'static str {
            "memory"
        }
    }

    /// Store whose append reports when it starts and then waits to be released.
    struct GatedStore {
        inner: MemoryStore,
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl LogStore for GatedStore {
        fn append(&self, entry: &LogEntry) -> LogResult<()> {
            self.started.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            self.inner.append(entry)
        }

        fn read_all(&self) -> LogResult<Vec<LogEntry>> {
            self.inner.read_all()
        }

        fn recover_last_id(&self) -> Result<u64, RecoveryError> {
            self.inner.recover_last_id()
        }

        fn kind(&self) -> &'static str {
            "gated"
        }
    }

    fn service(store: Arc<MemoryStore>) -> IngestService {
        IngestService::new(LogIdGenerator::new(None), store, Some(LiveFeed::new(16)))
    }

    #[tokio::test]
    async fn submit_assigns_sequential_ids() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone());

        let first = svc.submit("10.0.0.5", "info", "boot complete").await.unwrap();
        assert_eq!(first.log_id, 1);
        assert_eq!(first.level, LogLevel::Info);
        assert_eq!(first.user_id, "10.0.0.5");
        assert_eq!(first.message, "boot complete");

        let second = svc.submit("10.0.0.6", "warn", "fan speed high").await.unwrap();
        assert_eq!(second.log_id, 2);
        assert_eq!(store.read_all().unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn invalid_input_consumes_no_id() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone());

        for (remote, level, message, field) in [
            ("10.0.0.5", "info", "", "message"),
            ("10.0.0.5", "", "hello", "level"),
            ("10.0.0.5", "debug", "hello", "level"),
            ("10.0.0.5", "INFO", "hello", "level"),
            ("10.0.0.5", "Warn", "hello", "level"),
            ("", "error", "hello", "user_id"),
        ] {
            match svc.submit(remote, level, message).await {
                Err(LogError::Validation { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected validation error, got {other:?}"),
            }
        }

        assert_eq!(svc.last_issued_id(), 0);
        assert!(store.read_all().unwrap().is_empty());
        assert_eq!(svc.submit("10.0.0.5", "error", "ok").await.unwrap().log_id, 1);
    }

    #[tokio::test]
    async fn failed_append_burns_the_id_and_skips_broadcast() {
        let store = Arc::new(MemoryStore {
            fail_appends: true,
            ..MemoryStore::default()
        });
        let svc = service(store);
        let mut sub = svc.feed().unwrap().subscribe();

        let err = svc.submit("10.0.0.5", "info", "lost").await.unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(svc.last_issued_id(), 1);

        svc.feed().unwrap().publish(&LogEntry::new(99, Utc::now(), LogLevel::Info, "x", "marker"));
        assert_eq!(sub.next_entry().await.unwrap().log_id, 99);
    }

    #[tokio::test]
    async fn successful_submit_is_broadcast() {
        let svc = service(Arc::new(MemoryStore::default()));
        let mut sub = svc.feed().unwrap().subscribe();

        let stored = svc.submit("10.0.0.5", "error", "kaboom").await.unwrap();
        assert_eq!(sub.next_entry().await.unwrap(), stored);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_caller_still_broadcasts_a_persisted_entry() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Arc::new(GatedStore {
            inner: MemoryStore::default(),
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        });
        let svc = Arc::new(IngestService::new(
            LogIdGenerator::new(None),
            store.clone(),
            Some(LiveFeed::new(16)),
        ));
        let mut sub = svc.feed().unwrap().subscribe();

        let caller = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.submit("10.0.0.5", "info", "abandoned").await })
        };
        tokio::task::spawn_blocking(move || started_rx.recv())
            .await
            .unwrap()
            .unwrap();

        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());
        release_tx.send(()).unwrap();

        let delivered = tokio::time::timeout(Duration::from_secs(5), sub.next_entry())
            .await
            .expect("entry should be broadcast")
            .unwrap();
        assert_eq!(delivered.log_id, 1);
        assert_eq!(delivered.message, "abandoned");
        assert_eq!(store.read_all().unwrap(), vec![delivered]);
    }

    #[tokio::test]
    async fn recover_resumes_above_stored_ids() {
        let store = Arc::new(MemoryStore::default());
        store
            .append(&LogEntry::new(41, Utc::now(), LogLevel::Info, "a", "b"))
            .unwrap();

        let svc = IngestService::recover(store, None).await.unwrap();
        assert_eq!(svc.submit("10.0.0.5", "info", "next").await.unwrap().log_id, 42);
    }

    #[tokio::test]
    async fn list_all_on_empty_store_is_empty() {
        let svc = service(Arc::new(MemoryStore::default()));
        assert!(svc.list_all().await.unwrap().is_empty());
    }
}
