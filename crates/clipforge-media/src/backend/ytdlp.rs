//! Primary downloader backend: the yt-dlp CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use clipforge_models::Quality;

use super::{DownloaderBackend, VideoInfo};
use crate::error::{MediaError, MediaResult};

/// yt-dlp's `--dump-json` output, reduced to the fields we keep.
#[derive(Debug, Deserialize)]
struct DumpJson {
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
}

/// Downloads through the external `yt-dlp` tool.
#[derive(Debug, Default)]
pub struct YtDlpBackend;

impl YtDlpBackend {
    pub fn new() -> Self {
        Self
    }

    /// Format filter for the requested variant.
    ///
    /// With audio, prefer merged mp4 video+audio; without, video-only.
    fn format_filter(quality: Quality, include_audio: bool) -> String {
        let h = quality.max_height();
        if include_audio {
            format!(
                "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}][ext=mp4]/best[height<={h}]"
            )
        } else {
            format!("bestvideo[height<={h}][ext=mp4]/bestvideo[height<={h}]")
        }
    }
}

#[async_trait]
impl DownloaderBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn info(&self, url: &str) -> MediaResult<VideoInfo> {
        which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

        let output = Command::new("yt-dlp")
            .args(["--dump-json", "--no-download", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::download_failed(format!(
                "yt-dlp info failed: {}",
                stderr.lines().last().unwrap_or("Unknown error")
            )));
        }

        let dump: DumpJson = serde_json::from_slice(&output.stdout)?;
        Ok(VideoInfo {
            title: dump.title.unwrap_or_default(),
            duration_seconds: dump.duration,
            author: dump.uploader,
            thumbnail_url: dump.thumbnail,
        })
    }

    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        quality: Quality,
        include_audio: bool,
    ) -> MediaResult<PathBuf> {
        which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

        let format = Self::format_filter(quality, include_audio);
        let dest_str = destination.to_string_lossy().to_string();

        info!(
            url = url,
            destination = %destination.display(),
            format = %format,
            "Downloading video with yt-dlp"
        );

        // yt-dlp writes `{destination}.part` while in flight and renames on
        // completion, which is exactly the partial-artifact convention the
        // store scans for.
        let output = Command::new("yt-dlp")
            .args(["-f", &format, "--no-playlist", "-o", &dest_str, url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(MediaError::download_failed(format!(
                "yt-dlp failed: {}",
                stderr.lines().last().unwrap_or("Unknown error")
            )));
        }

        if !destination.exists() {
            return Err(MediaError::download_failed("Output file not created"));
        }

        let file_size = destination.metadata()?.len();
        if file_size == 0 {
            return Err(MediaError::download_failed("Output file is empty"));
        }

        info!(
            output = %destination.display(),
            size_mb = file_size as f64 / (1024.0 * 1024.0),
            "Downloaded video successfully"
        );

        Ok(destination.to_path_buf())
    }
}
