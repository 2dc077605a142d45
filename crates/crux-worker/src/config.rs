//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use crux_models::encoding::{
    DEFAULT_CRF, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, DEFAULT_PRESET, DEFAULT_VIDEO_CODEC,
    THUMBNAIL_TIMESTAMP,
};
use crux_models::NormalizationProfile;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent pipelines (admission permits)
    pub max_concurrent_jobs: usize,
    /// Parent directory of per-job staging directories
    pub work_dir: PathBuf,
    /// Explicit FFmpeg binary; `None` looks it up in PATH
    pub ffmpeg_path: Option<PathBuf>,
    /// Wall-clock budget of one transcode
    pub transcode_timeout: Duration,
    /// Target of the transcode step
    pub profile: NormalizationProfile,
    /// Seek position of the thumbnail frame
    pub thumbnail_offset: String,
    /// Minimum age of a `processing` row before reconciliation fails it
    pub stale_after: Duration,
    /// Graceful shutdown drain budget
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            work_dir: std::env::temp_dir().join("crux"),
            ffmpeg_path: None,
            transcode_timeout: Duration::from_secs(600),
            profile: NormalizationProfile::default(),
            thumbnail_offset: THUMBNAIL_TIMESTAMP.to_string(),
            stale_after: Duration::ZERO,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            ffmpeg_path: std::env::var("FFMPEG_PATH").ok().map(PathBuf::from),
            transcode_timeout: env_parse("TRANSCODE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.transcode_timeout),
            profile: NormalizationProfile {
                max_width: env_parse("TRANSCODE_MAX_WIDTH").unwrap_or(DEFAULT_MAX_WIDTH),
                max_height: env_parse("TRANSCODE_MAX_HEIGHT").unwrap_or(DEFAULT_MAX_HEIGHT),
                codec: std::env::var("TRANSCODE_CODEC")
                    .unwrap_or_else(|_| DEFAULT_VIDEO_CODEC.to_string()),
                crf: env_parse("TRANSCODE_CRF").unwrap_or(DEFAULT_CRF),
                preset: std::env::var("TRANSCODE_PRESET")
                    .unwrap_or_else(|_| DEFAULT_PRESET.to_string()),
                ..defaults.profile
            },
            thumbnail_offset: std::env::var("THUMBNAIL_OFFSET")
                .unwrap_or(defaults.thumbnail_offset),
            stale_after: env_parse("WORKER_STALE_AFTER_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_after),
            shutdown_timeout: env_parse("SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
        }
    }

    /// Use `dir` as the staging parent.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = Some(path.into());
        self
    }

    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    pub fn with_transcode_timeout(mut self, timeout: Duration) -> Self {
        self.transcode_timeout = timeout;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
