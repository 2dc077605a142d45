//! Job intake and admission control.

use std::sync::Arc;
use std::time::Duration;

use crux_db::JobStore;
use crux_models::{ClimbMetadata, JobId, NewJob};
use tokio::sync::Semaphore;
use tracing::{info, warn};
use validator::Validate;

use crate::config::WorkerConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics;
use crate::orchestrator::Orchestrator;
use crate::publisher::ArtifactPublisher;
use crate::staging::StagingDir;
use crate::status::StatusTracker;

/// Raw upload as received by the boundary.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// Client-side file name, used only for the staged file's extension
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: Option<String>, data: Vec<u8>) -> Self {
        Self { file_name, data }
    }
}

/// Accepts uploads and runs each one as a detached pipeline task.
pub struct IngestService {
    store: Arc<dyn JobStore>,
    orchestrator: Arc<Orchestrator>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl IngestService {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        publisher: ArtifactPublisher,
    ) -> Self {
        let capacity = config.max_concurrent_jobs.max(1);
        let tracker = StatusTracker::new(Arc::clone(&store));
        let orchestrator = Orchestrator::new(config, publisher, tracker);

        info!("Ingest service accepting up to {} concurrent jobs", capacity);
        Self {
            store,
            orchestrator: Arc::new(orchestrator),
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn publisher(&self) -> &ArtifactPublisher {
        self.orchestrator.publisher()
    }

    pub fn config(&self) -> &WorkerConfig {
        self.orchestrator.config()
    }

    /// Jobs currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Validate, stage and record an upload, then start its pipeline.
    ///
    /// Returns as soon as the `processing` row exists.
    pub async fn submit(&self, upload: Upload, metadata: ClimbMetadata) -> PipelineResult<JobId> {
        if let Err(e) = validate(&upload, &metadata) {
            metrics::record_job_rejected("validation");
            return Err(e);
        }

        let permit = Arc::clone(&self.permits).try_acquire_owned().map_err(|_| {
            metrics::record_job_rejected("capacity");
            PipelineError::AtCapacity
        })?;

        let new_job = NewJob::new(metadata);
        let job_id = new_job.id;

        let staging =
            StagingDir::create(&self.config().work_dir, job_id, upload.file_name.as_deref())
                .await?;
        staging.write_source(&upload.data).await?;

        // On failure the staging guard drops here and removes the directory.
        let job = match self.store.create(new_job).await {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id = %job_id, "Failed to record job: {}", e);
                metrics::record_job_rejected("persistence");
                return Err(e.into());
            }
        };

        metrics::record_job_submitted();
        info!(
            job_id = %job.id,
            user_id = %job.metadata.user_id,
            bytes = upload.data.len(),
            "Accepted upload"
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            let _permit = permit;
            orchestrator.run(job_id, staging).await;
        });

        Ok(job_id)
    }

    /// Wait until no pipeline holds a permit, up to `timeout`.
    ///
    /// Returns `false` if jobs were still running when the timeout expired.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let all = self.capacity as u32;
        match tokio::time::timeout(timeout, self.permits.acquire_many(all)).await {
            Ok(Ok(_permits)) => true,
            Ok(Err(_)) => true,
            Err(_) => {
                warn!("{} jobs still running after {:?}", self.in_flight(), timeout);
                false
            }
        }
    }
}

fn validate(upload: &Upload, metadata: &ClimbMetadata) -> PipelineResult<()> {
    if upload.data.is_empty() {
        return Err(PipelineError::validation("video file is required"));
    }
    metadata
        .validate()
        .map_err(|e| PipelineError::validation(e.to_string()))
}
