//! Application state.

use std::sync::Arc;

use crux_db::JobStore;
use crux_storage::ObjectStore;
use crux_worker::{ArtifactPublisher, IngestService, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub jobs: Arc<dyn JobStore>,
    pub storage: Arc<dyn ObjectStore>,
    pub ingest: Arc<IngestService>,
}

impl AppState {
    /// Wire the ingest service to the given stores.
    pub fn new(
        config: ApiConfig,
        worker: WorkerConfig,
        jobs: Arc<dyn JobStore>,
        storage: Arc<dyn ObjectStore>,
    ) -> Self {
        let publisher = ArtifactPublisher::new(Arc::clone(&storage));
        let ingest = IngestService::new(worker, Arc::clone(&jobs), publisher);

        Self {
            config,
            jobs,
            storage,
            ingest: Arc::new(ingest),
        }
    }
}
