//! In-process broadcast of freshly persisted entries to live subscribers.
//!
//! Backed by a bounded `tokio::sync::broadcast` channel. Publishing never
//! waits: when a subscriber falls more than `capacity` entries behind, the
//! oldest pending entries are dropped for that subscriber only.

use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::log_entry::LogEntry;

#[derive(Debug, Clone)]
pub struct LiveFeed {
    sender: broadcast::Sender<LogEntry>,
}

impl LiveFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Best-effort publish. Returns how many subscribers will see the entry.
    pub fn publish(&self, entry: &LogEntry) -> usize {
        match self.sender.send(entry.clone()) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!(log_id = entry.log_id, "no live subscribers, entry not broadcast");
                0
            }
        }
    }

    /// Private view that sees every entry published from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<LogEntry>,
}

impl Subscription {
    /// Next entry, skipping past anything dropped while lagging. `None` once
    /// the feed itself is gone.
    pub async fn next_entry(&mut self) -> Option<LogEntry> {
        loop {
            match self.receiver.recv().await {
                Ok(entry) => return Some(entry),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "live subscriber lagged, oldest entries dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = LogEntry> + Send + 'static {
        stream::unfold(self, |mut sub| async move {
            sub.next_entry().await.map(|entry| (entry, sub))
        })
    }
}
