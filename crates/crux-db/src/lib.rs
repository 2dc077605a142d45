//! Job persistence for the ingestion pipeline.
//!
//! This crate provides:
//! - The [`JobStore`] seam shared by intake, the orchestrator and the API
//! - A PostgreSQL implementation with embedded migrations
//! - An in-memory implementation for tests
//! - [`CachedJobStore`], a read-through cache invalidated on every write

pub mod cache;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cache::CachedJobStore;
pub use error::{DbError, DbResult};
pub use memory::MemoryJobStore;
pub use postgres::{DbConfig, PgJobStore};
pub use store::JobStore;
