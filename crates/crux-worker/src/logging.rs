//! Structured lifecycle logging for ingestion jobs.

use std::fmt;
use std::time::Duration;

use crux_models::{JobId, JobStatus};
use tracing::{error, info, warn, Span};

/// Pipeline step a log event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcode,
    Thumbnail,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transcode => "transcode",
            Stage::Thumbnail => "thumbnail",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emits job events with a consistent `job_id` field.
///
/// Events are meant to be recorded inside [`JobLogger::span`], so lines
/// logged by lower crates carry the job id too.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
}

impl JobLogger {
    pub fn new(job_id: JobId) -> Self {
        Self { job_id }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn span(&self) -> Span {
        tracing::info_span!("ingest", job_id = %self.job_id)
    }

    pub fn started(&self, staging: &std::path::Path) {
        info!(job_id = %self.job_id, staging = %staging.display(), "Job started");
    }

    pub fn stage_done(&self, stage: Stage, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            stage = %stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage finished"
        );
    }

    /// A best-effort stage failed and the job continues without it.
    pub fn fallback(&self, stage: Stage, reason: &dyn fmt::Display) {
        warn!(job_id = %self.job_id, stage = %stage, "Stage skipped: {}", reason);
    }

    pub fn failed(&self, reason: &dyn fmt::Display) {
        error!(job_id = %self.job_id, "Job failed: {}", reason);
    }

    pub fn finished(&self, status: JobStatus) {
        match status {
            JobStatus::Completed => info!(job_id = %self.job_id, %status, "Job finished"),
            _ => warn!(job_id = %self.job_id, %status, "Job finished"),
        }
    }
}
