//! Object store abstraction.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Durable blob store accepting put-by-key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file under `key` and return its retrievable URL.
    async fn put_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<String>;

    /// Delete the object stored under `key`.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Cheap reachability probe for readiness checks.
    async fn check_connectivity(&self) -> StorageResult<()>;

    /// URL under which `key` is served.
    fn public_url(&self, key: &str) -> String;
}
