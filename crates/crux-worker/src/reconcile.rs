//! Startup reconciliation.
//!
//! Jobs left `processing` by a previous process can never finish: their
//! staging directories died with it. Run once before intake opens.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crux_db::{DbError, JobStore};
use crux_models::TerminalUpdate;
use tracing::{info, warn};

use crate::metrics;
use crate::staging::STAGING_PREFIX;
use crate::status::StatusTracker;

pub const RESTART_MESSAGE: &str = "Worker restarted before the job finished. Please upload again.";

/// Outcome of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub failed_jobs: usize,
    pub removed_dirs: usize,
}

pub struct Reconciler {
    tracker: StatusTracker,
    work_dir: PathBuf,
}

impl Reconciler {
    pub fn new(store: Arc<dyn JobStore>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            tracker: StatusTracker::new(store),
            work_dir: work_dir.into(),
        }
    }

    /// Fail `processing` rows created before `cutoff` and sweep leftover
    /// staging directories.
    pub async fn run_once(&self, cutoff: DateTime<Utc>) -> anyhow::Result<ReconcileReport> {
        let stale = self.tracker.store().list_processing_before(cutoff).await?;
        let mut report = ReconcileReport::default();

        for job in stale {
            let update = TerminalUpdate::Failed {
                error: RESTART_MESSAGE.to_string(),
            };
            match self.tracker.finish(job.id, &update).await {
                Ok(_) => {
                    warn!(
                        job_id = %job.id,
                        created_at = %job.created_at,
                        "Marked abandoned job as failed"
                    );
                    report.failed_jobs += 1;
                }
                // Finished concurrently; nothing to do.
                Err(DbError::InvalidTransition { .. }) | Err(DbError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        report.removed_dirs = sweep_staging(&self.work_dir).await?;
        metrics::record_jobs_reconciled(report.failed_jobs as u64);

        if report.failed_jobs > 0 || report.removed_dirs > 0 {
            info!(
                "Reconciliation complete: {} jobs failed, {} staging directories removed",
                report.failed_jobs, report.removed_dirs
            );
        }
        Ok(report)
    }
}

async fn sweep_staging(work_dir: &Path) -> anyhow::Result<usize> {
    let mut entries = match tokio::fs::read_dir(work_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let is_staging = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(STAGING_PREFIX));
        if !is_staging || !entry.file_type().await?.is_dir() {
            continue;
        }

        match tokio::fs::remove_dir_all(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), "Failed to remove leftover staging: {}", e),
        }
    }
    Ok(removed)
}
