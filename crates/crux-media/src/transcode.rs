//! Transcoding to the normalization profile.

use std::path::Path;
use std::time::{Duration, Instant};

use crux_models::NormalizationProfile;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Build the transcode command for a profile.
pub fn transcode_command(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    profile: &NormalizationProfile,
) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .video_filter(profile.scale_filter())
        .video_codec(&profile.codec)
        .preset(&profile.preset)
        .crf(profile.crf)
        .output_args(["-pix_fmt", "yuv420p"])
        .audio_codec(&profile.audio_codec)
        .audio_bitrate(&profile.audio_bitrate)
        .output_args(["-movflags", "+faststart"])
}

/// Normalize `input` into `output` within `timeout`.
///
/// On expiry the FFmpeg process group is killed and
/// [`MediaError::Timeout`] is returned.
pub async fn transcode_video(
    runner: &FfmpegRunner,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    profile: &NormalizationProfile,
    timeout: Duration,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    if tokio::fs::metadata(input).await.is_err() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    let cmd = transcode_command(input, output, profile);
    let started = Instant::now();

    runner.clone().with_timeout(timeout).run(&cmd).await?;

    info!(
        "Transcoded {} -> {} in {:.1}s",
        input.display(),
        output.display(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::test_support::*;
    use tempfile::TempDir;

    #[test]
    fn test_transcode_command_args() {
        let profile = NormalizationProfile::default();
        let args = transcode_command("in.mov", "out.mp4", &profile).build_args();

        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
        assert!(args.contains(&"23".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[tokio::test]
    async fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let err = transcode_video(
            &FfmpegRunner::new(),
            dir.path().join("missing.mov"),
            dir.path().join("out.mp4"),
            &NormalizationProfile::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_transcode_with_fake_ffmpeg() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "ffmpeg", WRITES_OUTPUT);
        let input = dir.path().join("source.mov");
        std::fs::write(&input, b"raw").unwrap();
        let output = dir.path().join("normalized.mp4");

        transcode_video(
            &FfmpegRunner::new().with_binary(ffmpeg),
            &input,
            &output,
            &NormalizationProfile::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"normalized");
    }

    #[tokio::test]
    async fn test_transcode_timeout() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "ffmpeg", "sleep 30");
        let input = dir.path().join("source.mov");
        std::fs::write(&input, b"raw").unwrap();

        let err = transcode_video(
            &FfmpegRunner::new().with_binary(ffmpeg),
            &input,
            dir.path().join("normalized.mp4"),
            &NormalizationProfile::default(),
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::Timeout(d) if d == Duration::from_millis(300)));
    }
}
