//! Job records and the job status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::metadata::ClimbMetadata;

/// Unique identifier for an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Job processing status.
///
/// `Processing` is the only non-terminal state; every job ends in exactly
/// one of the other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is being transcoded and published
    #[default]
    Processing,
    /// Video published (thumbnail may be the placeholder)
    Completed,
    /// Transcode or publication failed
    Failed,
    /// Transcode exceeded its wall-clock budget
    Timeout,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a stored status string is not recognised.
#[derive(Debug, Error)]
#[error("unknown job status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for JobStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "timeout" => Ok(JobStatus::Timeout),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Input for creating a job row at intake.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobId,
    pub metadata: ClimbMetadata,
}

impl NewJob {
    pub fn new(metadata: ClimbMetadata) -> Self {
        Self {
            id: JobId::new(),
            metadata,
        }
    }
}

/// The single terminal write applied to a processing job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalUpdate {
    Completed {
        video_url: String,
        video_key: String,
        thumbnail_url: String,
        thumbnail_key: Option<String>,
    },
    Failed {
        error: String,
    },
    TimedOut {
        error: String,
    },
}

impl TerminalUpdate {
    /// Status the job moves to.
    pub fn status(&self) -> JobStatus {
        match self {
            TerminalUpdate::Completed { .. } => JobStatus::Completed,
            TerminalUpdate::Failed { .. } => JobStatus::Failed,
            TerminalUpdate::TimedOut { .. } => JobStatus::Timeout,
        }
    }
}

/// One ingestion request, end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,

    pub status: JobStatus,

    #[serde(flatten)]
    pub metadata: ClimbMetadata,

    /// Published normalized video (unset while processing)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Published thumbnail or the placeholder (unset while processing)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,

    /// Error message (if failed or timed out)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build the initial `processing` record for a new job.
    pub fn processing(new: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            status: JobStatus::Processing,
            metadata: new.metadata,
            video_url: None,
            thumbnail_url: None,
            video_key: None,
            thumbnail_key: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a terminal update in place.
    ///
    /// Returns the current status as the error when the job is already
    /// terminal; the record is left untouched in that case.
    pub fn apply(&mut self, update: &TerminalUpdate, now: DateTime<Utc>) -> Result<(), JobStatus> {
        if self.is_terminal() {
            return Err(self.status);
        }

        self.status = update.status();
        self.updated_at = now;
        self.completed_at = Some(now);

        match update {
            TerminalUpdate::Completed {
                video_url,
                video_key,
                thumbnail_url,
                thumbnail_key,
            } => {
                self.video_url = Some(video_url.clone());
                self.video_key = Some(video_key.clone());
                self.thumbnail_url = Some(thumbnail_url.clone());
                self.thumbnail_key = thumbnail_key.clone();
            }
            TerminalUpdate::Failed { error } | TerminalUpdate::TimedOut { error } => {
                self.error_message = Some(error.clone());
            }
        }

        Ok(())
    }
}
