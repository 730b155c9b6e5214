//! Downloader backends.
//!
//! Each backend is one pluggable strategy for fetching video info and bytes
//! from a source URL. The orchestrator iterates them in priority order
//! (yt-dlp CLI, HTTP streaming, browser automation), advancing on any error,
//! so a single flaky tool never fails an acquisition on its own.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use clipforge_models::Quality;

use crate::error::{MediaError, MediaResult};

pub mod automation;
pub mod http;
pub mod ytdlp;

pub use automation::AutomationBackend;
pub use http::HttpStreamBackend;
pub use ytdlp::YtDlpBackend;

/// Selector value requesting the full fallback chain.
pub const BACKEND_AUTO: &str = "auto";

/// Metadata reported by a backend before fetching.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub duration_seconds: Option<f64>,
    pub author: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Capability interface every downloader backend implements.
#[async_trait]
pub trait DownloaderBackend: Send + Sync {
    /// Stable name used for pinning a backend by callers.
    fn name(&self) -> &'static str;

    /// Fetch video metadata without downloading.
    async fn info(&self, url: &str) -> MediaResult<VideoInfo>;

    /// Fetch video bytes to `destination`. Returns the path written.
    ///
    /// Implementations write through a `.part` sibling while in flight so
    /// abandoned downloads are discoverable on disk.
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        quality: Quality,
        include_audio: bool,
    ) -> MediaResult<PathBuf>;
}

/// Build the backend list for a selector.
///
/// `"auto"` yields the full priority-ordered chain; a backend name yields
/// just that backend (the fallback chain is skipped entirely); anything else
/// is an error.
pub fn backend_chain(selector: &str) -> MediaResult<Vec<Arc<dyn DownloaderBackend>>> {
    let full: Vec<Arc<dyn DownloaderBackend>> = vec![
        Arc::new(YtDlpBackend::new()),
        Arc::new(HttpStreamBackend::new()),
        Arc::new(AutomationBackend::from_env()),
    ];

    if selector == BACKEND_AUTO {
        return Ok(full);
    }

    match full.into_iter().find(|b| b.name() == selector) {
        Some(backend) => Ok(vec![backend]),
        None => Err(MediaError::UnknownBackend(selector.to_string())),
    }
}
