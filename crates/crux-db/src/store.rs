//! Job store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crux_models::{Job, JobId, NewJob, TerminalUpdate};

use crate::error::DbResult;

/// Persistence for job rows.
///
/// `transition` is the only mutation of an existing row and must be atomic:
/// it succeeds only while the row is still `processing`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new row with status `processing`.
    async fn create(&self, new_job: NewJob) -> DbResult<Job>;

    async fn get(&self, id: JobId) -> DbResult<Option<Job>>;

    /// Jobs newest first, optionally restricted to one owner.
    async fn list(&self, owner: Option<&str>) -> DbResult<Vec<Job>>;

    /// Apply the terminal write; fails with `InvalidTransition` if the job
    /// already left `processing`.
    async fn transition(&self, id: JobId, update: &TerminalUpdate) -> DbResult<Job>;

    /// Remove a terminal job, returning the deleted row.
    async fn delete(&self, id: JobId) -> DbResult<Job>;

    /// `processing` rows created before `cutoff`.
    async fn list_processing_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Job>>;

    /// Sorted distinct tags across all jobs.
    async fn list_tags(&self) -> DbResult<Vec<String>>;

    /// Connectivity probe.
    async fn ping(&self) -> DbResult<()>;
}
