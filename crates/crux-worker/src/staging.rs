//! Per-job staging directories.
//!
//! A [`StagingDir`] is exclusively owned by one job. It is removed by
//! [`StagingDir::release`] when the pipeline finishes, or by `Drop` if the
//! owning task unwinds or intake aborts before the job starts.

use std::path::{Path, PathBuf};

use crux_models::JobId;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Name prefix of every staging directory under the work dir.
pub const STAGING_PREFIX: &str = "job-";

const NORMALIZED_FILE: &str = "normalized.mp4";
const THUMBNAIL_FILE: &str = "thumbnail.jpg";

#[derive(Debug)]
pub struct StagingDir {
    dir: TempDir,
    source: PathBuf,
}

impl StagingDir {
    /// Create a fresh directory for `job_id` under `work_dir`.
    pub async fn create(
        work_dir: &Path,
        job_id: JobId,
        file_name: Option<&str>,
    ) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(work_dir).await?;

        let parent = work_dir.to_path_buf();
        let prefix = format!("{STAGING_PREFIX}{job_id}-");
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(parent)
        })
        .await
        .map_err(std::io::Error::other)??;
        let source = dir.path().join(source_file_name(file_name));

        debug!(job_id = %job_id, path = %dir.path().display(), "Created staging directory");
        Ok(Self { dir, source })
    }

    /// Write the raw upload.
    pub async fn write_source(&self, data: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(&self.source, data).await
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_path(&self) -> &Path {
        &self.source
    }

    pub fn normalized_path(&self) -> PathBuf {
        self.dir.path().join(NORMALIZED_FILE)
    }

    pub fn thumbnail_path(&self) -> PathBuf {
        self.dir.path().join(THUMBNAIL_FILE)
    }

    /// Remove the directory. Failures are logged only.
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Removed staging directory"),
            Err(e) => warn!(path = %path.display(), "Failed to remove staging directory: {}", e),
        }
    }
}

/// `source.<ext>`, keeping a short alphanumeric extension from the upload.
fn source_file_name(file_name: Option<&str>) -> String {
    let ext = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());
    format!("source.{ext}")
}
