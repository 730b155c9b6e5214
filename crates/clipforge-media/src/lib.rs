//! External tool drivers for ClipForge.
//!
//! This crate wraps the tools the engine orchestrates but does not
//! re-implement:
//! - downloader backends (yt-dlp CLI, HTTP streaming, browser automation)
//!   behind a common capability trait with a fallback-chain registry
//! - FFmpeg command building and running with progress parsing
//! - ffprobe metadata probing and thumbnail extraction

pub mod backend;
pub mod clip;
pub mod command;
pub mod error;
pub mod filters;
pub mod probe;
pub mod progress;

pub use backend::{backend_chain, DownloaderBackend, VideoInfo};
pub use clip::{create_clip, generate_thumbnail};
pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use filters::filter_for_aspect;
pub use probe::probe_duration;
pub use progress::FfmpegProgress;
