use sqlx::PgPool;
use std::sync::Arc;

use crate::db::job_store::JobStore;
use crate::services::ingest::IngestService;
use crate::services::queue::IngestQueue;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jobs: Arc<dyn JobStore>,
    pub ingest: Arc<IngestService>,
    pub queue: IngestQueue,
}

impl AppState {
    pub fn new(
        db: PgPool,
        jobs: Arc<dyn JobStore>,
        ingest: IngestService,
        queue: IngestQueue,
    ) -> Self {
        Self {
            db,
            jobs,
            ingest: Arc::new(ingest),
            queue,
        }
    }
}
