//! Shared data models for the Crux ingestion pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job ids and the job status state machine
//! - Climb metadata submitted alongside an upload
//! - Normalization (encoding) profile and placeholder URLs

pub mod encoding;
pub mod job;
pub mod metadata;

pub use encoding::{
    NormalizationProfile, PROCESSING_PLACEHOLDER_URL, THUMBNAIL_PLACEHOLDER_URL,
};
pub use job::{Job, JobId, JobStatus, NewJob, ParseStatusError, TerminalUpdate};
pub use metadata::{parse_tags, ClimbMetadata};
