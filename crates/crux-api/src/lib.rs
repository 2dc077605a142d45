//! Axum HTTP API for the ingestion pipeline.
//!
//! This crate provides:
//! - Upload intake, job status and owner listings
//! - Tag listing and job deletion
//! - Health, readiness and Prometheus metrics endpoints

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
