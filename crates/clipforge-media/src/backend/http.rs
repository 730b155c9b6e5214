//! Library-based fallback backend: direct HTTP streaming.
//!
//! Handles direct and progressive media URLs without any CLI dependency by
//! streaming the response body to disk. Metadata comes from the platform's
//! oEmbed endpoint when the URL has one, otherwise from the response headers.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use clipforge_models::{Quality, PARTIAL_SUFFIX};

use super::{DownloaderBackend, VideoInfo};
use crate::error::{MediaError, MediaResult};

/// oEmbed endpoint for platform URLs.
const OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

#[derive(Debug, Deserialize)]
struct OembedResponse {
    title: Option<String>,
    author_name: Option<String>,
    thumbnail_url: Option<String>,
}

/// Streams video bytes over plain HTTP.
#[derive(Debug)]
pub struct HttpStreamBackend {
    client: reqwest::Client,
}

impl Default for HttpStreamBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpStreamBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Whether the URL belongs to a platform with an oEmbed endpoint.
    fn has_oembed(url: &str) -> bool {
        let url = url.to_ascii_lowercase();
        url.contains("youtube.com") || url.contains("youtu.be")
    }

    /// Title fallback: the last path segment of the URL.
    fn title_from_url(url: &str) -> String {
        url.rsplit('/')
            .next()
            .unwrap_or(url)
            .split(['?', '#'])
            .next()
            .unwrap_or("")
            .to_string()
    }
}

#[async_trait]
impl DownloaderBackend for HttpStreamBackend {
    fn name(&self) -> &'static str {
        "http-stream"
    }

    async fn info(&self, url: &str) -> MediaResult<VideoInfo> {
        if Self::has_oembed(url) {
            let response = self
                .client
                .get(OEMBED_ENDPOINT)
                .query(&[("url", url), ("format", "json")])
                .send()
                .await?
                .error_for_status()?;

            let oembed: OembedResponse = response.json().await?;
            return Ok(VideoInfo {
                title: oembed.title.unwrap_or_default(),
                duration_seconds: None,
                author: oembed.author_name,
                thumbnail_url: oembed.thumbnail_url,
            });
        }

        // Direct URLs: a HEAD request confirms the resource exists
        self.client.head(url).send().await?.error_for_status()?;

        Ok(VideoInfo {
            title: Self::title_from_url(url),
            duration_seconds: None,
            author: None,
            thumbnail_url: None,
        })
    }

    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        _quality: Quality,
        _include_audio: bool,
    ) -> MediaResult<PathBuf> {
        info!(
            url = url,
            destination = %destination.display(),
            "Streaming video over HTTP"
        );

        let response = self.client.get(url).send().await?.error_for_status()?;

        // Stream into the `.part` sibling, then rename, so a crash mid-stream
        // leaves a discoverable partial artifact instead of a truncated file
        // under the canonical name.
        let partial = PathBuf::from(format!("{}{}", destination.display(), PARTIAL_SUFFIX));
        let mut file = tokio::fs::File::create(&partial).await?;

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if written == 0 {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(MediaError::download_failed("Response body was empty"));
        }

        tokio::fs::rename(&partial, destination).await?;

        debug!(
            output = %destination.display(),
            size_bytes = written,
            "HTTP stream complete"
        );

        Ok(destination.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_title_from_url() {
        assert_eq!(
            HttpStreamBackend::title_from_url("https://cdn.example.com/media/intro.mp4?sig=x"),
            "intro.mp4"
        );
    }

    #[tokio::test]
    async fn test_fetch_streams_body_to_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake video bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("abc_720p_true.mp4");

        let backend = HttpStreamBackend::new();
        let url = format!("{}/video.mp4", server.uri());
        let written = backend
            .fetch(&url, &dest, Quality::P720, true)
            .await
            .unwrap();

        assert_eq!(written, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"fake video bytes");
        // No partial left behind
        assert!(!dir.path().join("abc_720p_true.mp4.part").exists());
    }

    #[tokio::test]
    async fn test_fetch_rejects_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("gone_720p_true.mp4");

        let backend = HttpStreamBackend::new();
        let url = format!("{}/gone.mp4", server.uri());
        let result = backend.fetch(&url, &dest, Quality::P720, true).await;

        assert!(result.is_err());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_rejects_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/empty.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(Vec::new()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty_720p_true.mp4");

        let backend = HttpStreamBackend::new();
        let url = format!("{}/empty.mp4", server.uri());
        let result = backend.fetch(&url, &dest, Quality::P720, true).await;

        assert!(result.is_err());
        assert!(!dest.exists());
    }
}
