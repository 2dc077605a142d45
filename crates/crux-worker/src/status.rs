//! Job status tracking.
//!
//! Wraps the job store's guarded transition with retries for transient
//! store failures. Rejected transitions are never retried: a terminal
//! job stays as it is.

use std::sync::Arc;

use crux_db::{DbError, DbResult, JobStore};
use crux_models::{Job, JobId, TerminalUpdate};
use tracing::{error, warn};

use crate::metrics;
use crate::retry::{retry_async, RetryConfig, RetryResult};

#[derive(Clone)]
pub struct StatusTracker {
    store: Arc<dyn JobStore>,
    retry: RetryConfig,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            retry: RetryConfig::new("status_write"),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Apply the terminal write for `id`.
    pub async fn finish(&self, id: JobId, update: &TerminalUpdate) -> DbResult<Job> {
        let result = retry_async(
            &self.retry,
            || self.store.transition(id, update),
            DbError::is_transient,
        )
        .await;

        match result {
            RetryResult::Success(job) => Ok(job),
            RetryResult::Failed { error: e, attempts } => {
                match &e {
                    DbError::InvalidTransition { status, .. } => {
                        warn!(job_id = %id, "Refused {} write, job is already {}", update.status(), status);
                    }
                    _ => {
                        error!(
                            job_id = %id,
                            attempts,
                            "Failed to record {} status: {}", update.status(), e
                        );
                        metrics::record_status_write_failure();
                    }
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crux_db::MemoryJobStore;
    use crux_models::{ClimbMetadata, JobStatus, NewJob};
    use std::time::Duration;

    fn tracker(store: Arc<MemoryJobStore>) -> StatusTracker {
        StatusTracker::new(store)
            .with_retry(RetryConfig::new("test").with_base_delay(Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_finish_writes_once() {
        let store = Arc::new(MemoryJobStore::new());
        let job = store
            .create(NewJob::new(ClimbMetadata::new("u1", "Session")))
            .await
            .unwrap();
        let tracker = tracker(store.clone());

        let done = tracker
            .finish(job.id, &TerminalUpdate::TimedOut { error: "slow".into() })
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Timeout);

        let err = tracker
            .finish(job.id, &TerminalUpdate::Failed { error: "late".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidTransition { .. }));
        assert_eq!(
            store.get(job.id).await.unwrap().unwrap().status,
            JobStatus::Timeout
        );
    }

    #[tokio::test]
    async fn test_finish_gives_up_on_unavailable_store() {
        let store = Arc::new(MemoryJobStore::new());
        let job = store
            .create(NewJob::new(ClimbMetadata::new("u1", "Session")))
            .await
            .unwrap();
        store.set_unavailable(true);

        let err = tracker(store.clone())
            .finish(job.id, &TerminalUpdate::Failed { error: "x".into() })
            .await
            .unwrap_err();
        assert!(err.is_transient());

        store.set_unavailable(false);
        assert_eq!(
            store.get(job.id).await.unwrap().unwrap().status,
            JobStatus::Processing
        );
    }
}
