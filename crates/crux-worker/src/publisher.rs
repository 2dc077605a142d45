//! Artifact publication.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crux_models::encoding::{THUMBNAIL_CONTENT_TYPE, VIDEO_CONTENT_TYPE};
use crux_models::{TerminalUpdate, THUMBNAIL_PLACEHOLDER_URL};
use crux_storage::{artifact_key, ArtifactKind, ObjectStore};
use tracing::{info, warn};

use crate::error::PipelineResult;
use crate::metrics;

/// URLs and keys of a published job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifacts {
    pub video_url: String,
    pub video_key: String,
    /// Uploaded thumbnail URL or [`THUMBNAIL_PLACEHOLDER_URL`]
    pub thumbnail_url: String,
    /// `None` when the placeholder is used
    pub thumbnail_key: Option<String>,
}

impl PublishedArtifacts {
    pub fn into_update(self) -> TerminalUpdate {
        TerminalUpdate::Completed {
            video_url: self.video_url,
            video_key: self.video_key,
            thumbnail_url: self.thumbnail_url,
            thumbnail_key: self.thumbnail_key,
        }
    }
}

/// Uploads pipeline outputs under fresh keys.
#[derive(Clone)]
pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Upload the normalized video and, if present, the thumbnail.
    ///
    /// A video upload failure is returned; a thumbnail upload failure falls
    /// back to the placeholder.
    pub async fn publish(
        &self,
        video_path: &Path,
        thumbnail_path: Option<&Path>,
    ) -> PipelineResult<PublishedArtifacts> {
        let video_key = artifact_key(ArtifactKind::Video);
        let started = Instant::now();
        let video_url = self
            .store
            .put_file(video_path, &video_key, VIDEO_CONTENT_TYPE)
            .await?;
        metrics::record_upload_duration("video", started.elapsed().as_secs_f64());
        info!(key = %video_key, "Published normalized video");

        let (thumbnail_url, thumbnail_key) = match thumbnail_path {
            Some(path) => self.publish_thumbnail(path).await,
            None => (THUMBNAIL_PLACEHOLDER_URL.to_string(), None),
        };

        Ok(PublishedArtifacts {
            video_url,
            video_key,
            thumbnail_url,
            thumbnail_key,
        })
    }

    async fn publish_thumbnail(&self, path: &Path) -> (String, Option<String>) {
        let key = artifact_key(ArtifactKind::Thumbnail);
        let started = Instant::now();

        match self.store.put_file(path, &key, THUMBNAIL_CONTENT_TYPE).await {
            Ok(url) => {
                metrics::record_upload_duration("thumbnail", started.elapsed().as_secs_f64());
                (url, Some(key))
            }
            Err(e) => {
                warn!(key = %key, "Thumbnail upload failed, using placeholder: {}", e);
                metrics::record_thumbnail_fallback();
                (THUMBNAIL_PLACEHOLDER_URL.to_string(), None)
            }
        }
    }

    /// Delete the stored objects of a job. Missing objects are ignored.
    pub async fn remove(&self, keys: impl IntoIterator<Item = &str>) -> PipelineResult<()> {
        for key in keys {
            match self.store.delete(key).await {
                Err(e) if !e.is_not_found() => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    }
}
