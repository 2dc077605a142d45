//! FFmpeg CLI wrapper for video normalization.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A runner with a hard wall-clock deadline that kills the whole
//!   process group on expiry
//! - Transcoding to the normalization profile
//! - Single-frame thumbnail extraction

pub mod command;
pub mod error;
pub mod thumbnail;
pub mod transcode;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use thumbnail::generate_thumbnail;
pub use transcode::transcode_video;
