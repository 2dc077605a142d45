//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use crux_models::JobStatus;
use metrics::{counter, gauge, histogram};

pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "crux_jobs_submitted_total";
    pub const JOBS_REJECTED_TOTAL: &str = "crux_jobs_rejected_total";
    pub const JOBS_FINISHED_TOTAL: &str = "crux_jobs_finished_total";
    pub const JOBS_IN_FLIGHT: &str = "crux_jobs_in_flight";
    pub const TRANSCODE_DURATION_SECONDS: &str = "crux_transcode_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "crux_upload_duration_seconds";
    pub const THUMBNAIL_FALLBACKS_TOTAL: &str = "crux_thumbnail_fallbacks_total";
    pub const STATUS_WRITE_FAILURES_TOTAL: &str = "crux_status_write_failures_total";
    pub const JOBS_RECONCILED_TOTAL: &str = "crux_jobs_reconciled_total";
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
    gauge!(names::JOBS_IN_FLIGHT).increment(1.0);
}

/// Record a rejected submission (`validation`, `capacity`, `persistence`).
pub fn record_job_rejected(reason: &'static str) {
    counter!(names::JOBS_REJECTED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_job_finished(status: JobStatus) {
    counter!(names::JOBS_FINISHED_TOTAL, "status" => status.as_str()).increment(1);
    gauge!(names::JOBS_IN_FLIGHT).decrement(1.0);
}

pub fn record_transcode_duration(duration_secs: f64) {
    histogram!(names::TRANSCODE_DURATION_SECONDS).record(duration_secs);
}

/// Record an artifact upload (`video` or `thumbnail`).
pub fn record_upload_duration(artifact: &'static str, duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS, "artifact" => artifact).record(duration_secs);
}

pub fn record_thumbnail_fallback() {
    counter!(names::THUMBNAIL_FALLBACKS_TOTAL).increment(1);
}

pub fn record_status_write_failure() {
    counter!(names::STATUS_WRITE_FAILURES_TOTAL).increment(1);
}

pub fn record_jobs_reconciled(count: u64) {
    counter!(names::JOBS_RECONCILED_TOTAL).increment(count);
}
