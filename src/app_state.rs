use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::ingest::IngestService;

/// Shared state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(ingest: IngestService) -> Self {
        Self {
            ingest: Arc::new(ingest),
            started_at: Utc::now(),
        }
    }
}
