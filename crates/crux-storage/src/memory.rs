//! In-memory object store for tests and local development.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::keys::validate_key;
use crate::store::ObjectStore;

/// A stored blob.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Object store backed by a map.
#[derive(Debug)]
pub struct MemoryObjectStore {
    base_url: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://crux")
    }
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a stored object.
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    /// Resolve a URL produced by this store back to its object.
    pub async fn resolve(&self, url: &str) -> Option<StoredObject> {
        let key = url.strip_prefix(&self.base_url)?.trim_start_matches('/');
        self.get(key).await
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<String> {
        validate_key(key)?;
        let bytes = tokio::fs::read(path).await?;

        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );

        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.objects
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_resolve_delete() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("clip.mp4");
        tokio::fs::write(&file, b"video").await.unwrap();

        let store = MemoryObjectStore::default();
        let url = store
            .put_file(&file, "videos/a.mp4", "video/mp4")
            .await
            .unwrap();

        assert_eq!(url, "memory://crux/videos/a.mp4");
        let object = store.resolve(&url).await.unwrap();
        assert_eq!(object.bytes, b"video");
        assert_eq!(object.content_type, "video/mp4");

        store.delete("videos/a.mp4").await.unwrap();
        assert!(store.is_empty().await);
        assert!(matches!(
            store.delete("videos/a.mp4").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_missing_file() {
        let store = MemoryObjectStore::default();
        let err = store
            .put_file(Path::new("/nonexistent/clip.mp4"), "videos/a.mp4", "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
