//! Artifact key generation.
//!
//! Keys are random per upload and never contain user input, so
//! publishing twice never overwrites an earlier artifact.

use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Kind of artifact being published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Video,
    Thumbnail,
}

impl ArtifactKind {
    fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "videos",
            ArtifactKind::Thumbnail => "thumbnails",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "mp4",
            ArtifactKind::Thumbnail => "jpg",
        }
    }
}

/// Generate a fresh, globally unique key for an artifact.
pub fn artifact_key(kind: ArtifactKind) -> String {
    format!("{}/{}.{}", kind.prefix(), Uuid::new_v4(), kind.extension())
}

/// Reject keys that could escape the bucket prefix layout.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
