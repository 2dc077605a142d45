//! Thumbnail generation.

use std::path::Path;

use crux_models::encoding::THUMBNAIL_SCALE_WIDTH;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Build the single-frame extraction command.
pub fn thumbnail_command(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    offset: &str,
) -> FfmpegCommand {
    FfmpegCommand::new(video_path, output_path)
        .seek(offset)
        .single_frame()
        .video_filter(format!("scale={}:-2", THUMBNAIL_SCALE_WIDTH))
        .output_args(["-q:v", "3"])
}

/// Grab one frame at `offset` from an already normalized video.
pub async fn generate_thumbnail(
    runner: &FfmpegRunner,
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    offset: &str,
) -> MediaResult<()> {
    let cmd = thumbnail_command(video_path, output_path, offset);
    runner.run(&cmd).await
}
