//! Climbing-video ingestion pipeline.
//!
//! [`IngestService`] accepts an upload, stages it and records the job, then
//! hands it to the [`Orchestrator`], which transcodes, extracts a thumbnail,
//! publishes the artifacts and writes exactly one terminal status before
//! releasing the staging directory.

pub mod config;
pub mod error;
pub mod intake;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod publisher;
pub mod reconcile;
pub mod retry;
pub mod staging;
pub mod status;

pub use config::WorkerConfig;
pub use error::{PipelineError, PipelineResult};
pub use intake::{IngestService, Upload};
pub use logging::{JobLogger, Stage};
pub use orchestrator::Orchestrator;
pub use publisher::{ArtifactPublisher, PublishedArtifacts};
pub use reconcile::{ReconcileReport, Reconciler};
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use staging::StagingDir;
pub use status::StatusTracker;
