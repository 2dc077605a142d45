//! Durable object storage for pipeline artifacts.
//!
//! This crate provides:
//! - The [`ObjectStore`] seam used by the artifact publisher
//! - A Cloudflare R2 (S3 API) implementation
//! - An in-memory implementation for tests and local runs
//! - Collision-free artifact key generation

pub mod client;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::{artifact_key, validate_key, ArtifactKind};
pub use memory::MemoryObjectStore;
pub use store::ObjectStore;
