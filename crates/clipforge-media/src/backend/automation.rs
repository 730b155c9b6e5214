//! Fallback of last resort: an external browser-automation helper.
//!
//! Some sources refuse both yt-dlp and plain HTTP. For those, an external
//! helper drives a headless browser and exposes the same two operations as
//! every other backend over a small CLI contract:
//!
//! - `<helper> info <url>` prints a JSON object with `title`, `duration`,
//!   `author`, `thumbnail` on stdout
//! - `<helper> fetch <url> <destination> --max-height <n> [--no-audio]`
//!
//! The helper binary name is configurable through `CLIPFORGE_BROWSER_HELPER`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use clipforge_models::Quality;

use super::{DownloaderBackend, VideoInfo};
use crate::error::{MediaError, MediaResult};

/// Default helper binary name.
const DEFAULT_HELPER: &str = "browser-fetch";

/// Env var overriding the helper binary.
const HELPER_ENV: &str = "CLIPFORGE_BROWSER_HELPER";

#[derive(Debug, Deserialize)]
struct HelperInfo {
    title: Option<String>,
    duration: Option<f64>,
    author: Option<String>,
    thumbnail: Option<String>,
}

/// Drives the external browser-automation helper.
#[derive(Debug)]
pub struct AutomationBackend {
    helper: String,
}

impl AutomationBackend {
    pub fn new(helper: impl Into<String>) -> Self {
        Self {
            helper: helper.into(),
        }
    }

    /// Build from the environment, falling back to the default helper name.
    pub fn from_env() -> Self {
        let helper = std::env::var(HELPER_ENV).unwrap_or_else(|_| DEFAULT_HELPER.to_string());
        Self::new(helper)
    }

    fn require_helper(&self) -> MediaResult<()> {
        which::which(&self.helper).map_err(|_| MediaError::ToolNotFound(self.helper.clone()))?;
        Ok(())
    }
}

#[async_trait]
impl DownloaderBackend for AutomationBackend {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn info(&self, url: &str) -> MediaResult<VideoInfo> {
        self.require_helper()?;

        let output = Command::new(&self.helper)
            .args(["info", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::download_failed(format!(
                "{} info failed: {}",
                self.helper,
                stderr.lines().last().unwrap_or("Unknown error")
            )));
        }

        let parsed: HelperInfo = serde_json::from_slice(&output.stdout)?;
        Ok(VideoInfo {
            title: parsed.title.unwrap_or_default(),
            duration_seconds: parsed.duration,
            author: parsed.author,
            thumbnail_url: parsed.thumbnail,
        })
    }

    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        quality: Quality,
        include_audio: bool,
    ) -> MediaResult<PathBuf> {
        self.require_helper()?;

        let dest_str = destination.to_string_lossy().to_string();
        let max_height = quality.max_height().to_string();

        let mut args = vec!["fetch", url, &dest_str, "--max-height", &max_height];
        if !include_audio {
            args.push("--no-audio");
        }

        info!(
            url = url,
            helper = %self.helper,
            destination = %destination.display(),
            "Downloading video via browser automation"
        );

        let output = Command::new(&self.helper)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{} stderr: {}", self.helper, stderr);
            return Err(MediaError::download_failed(format!(
                "{} failed: {}",
                self.helper,
                stderr.lines().last().unwrap_or("Unknown error")
            )));
        }

        if !destination.exists() {
            return Err(MediaError::download_failed("Output file not created"));
        }
        if destination.metadata()?.len() == 0 {
            return Err(MediaError::download_failed("Output file is empty"));
        }

        Ok(destination.to_path_buf())
    }
}
