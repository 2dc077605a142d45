//! Pipeline error types.

use std::time::Duration;

use crux_db::DbError;
use crux_media::MediaError;
use crux_models::{JobStatus, TerminalUpdate};
use crux_storage::StorageError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid upload: {0}")]
    Validation(String),

    #[error("Worker at capacity, try again later")]
    AtCapacity,

    #[error("Persistence failed: {0}")]
    Persistence(#[from] DbError),

    #[error("Transcode failed: {message}")]
    Transcode {
        message: String,
        stderr: Option<String>,
    },

    #[error("Transcode timed out after {0:?}")]
    TranscodeTimeout(Duration),

    #[error("Publish failed: {0}")]
    Publish(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Terminal status a job ends in when its pipeline fails with this error.
    pub fn terminal_status(&self) -> JobStatus {
        match self {
            PipelineError::TranscodeTimeout(_) => JobStatus::Timeout,
            _ => JobStatus::Failed,
        }
    }

    /// Message stored on the job row, including the tool's stderr tail.
    pub fn job_message(&self) -> String {
        match self {
            PipelineError::Transcode {
                stderr: Some(stderr),
                ..
            } => format!("{self}\n{stderr}"),
            _ => self.to_string(),
        }
    }

    /// The single terminal write for a failed pipeline.
    pub fn terminal_update(&self) -> TerminalUpdate {
        let error = self.job_message();
        match self.terminal_status() {
            JobStatus::Timeout => TerminalUpdate::TimedOut { error },
            _ => TerminalUpdate::Failed { error },
        }
    }
}

impl From<MediaError> for PipelineError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Timeout(limit) => PipelineError::TranscodeTimeout(limit),
            MediaError::FfmpegFailed {
                message, stderr, ..
            } => PipelineError::Transcode { message, stderr },
            MediaError::Io(e) => PipelineError::Io(e),
            other => PipelineError::Transcode {
                message: other.to_string(),
                stderr: None,
            },
        }
    }
}
