//! Source identifier derivation from video URLs.
//!
//! A [`SourceId`] is the stable identity of a logical source video: the same
//! URL always derives the same id, so downloads for the same video land on
//! the same canonical file. Platform URLs with a recognizable video id use
//! that id directly; anything else falls back to a digest of the URL.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a platform video id (YouTube-shaped).
const PLATFORM_ID_LEN: usize = 11;

/// Hex characters kept from the URL digest fallback.
const DIGEST_ID_LEN: usize = 16;

/// Stable identifier for a source video, derived from its URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    /// Derive the identifier for a source URL.
    ///
    /// Recognized platform URLs (`watch?v=`, `youtu.be/`, `/embed/`, `/v/`,
    /// `/shorts/`) yield the embedded video id. Any other URL yields a
    /// truncated SHA-256 digest, so every URL maps to a stable id.
    pub fn from_url(url: &str) -> Self {
        let url = url.trim();

        if let Some(id) = extract_platform_id(url) {
            return Self(id);
        }

        let digest = Sha256::digest(url.as_bytes());
        let hex: String = digest
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>()
            .chars()
            .take(DIGEST_ID_LEN)
            .collect();
        Self(hex)
    }

    /// Create from an already-derived string (e.g. parsed from a filename).
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Extract a platform video id from a URL, if the URL has one.
fn extract_platform_id(url: &str) -> Option<String> {
    if !is_platform_domain(url) {
        return None;
    }

    let candidates = [
        after_marker(url, "?v="),
        after_marker(url, "&v="),
        after_marker(url, "youtu.be/"),
        after_marker(url, "/embed/"),
        after_marker(url, "/shorts/"),
        after_marker(url, "/v/"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|id| is_valid_platform_id(id))
}

/// Check whether the URL belongs to a platform with extractable ids.
fn is_platform_domain(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    url.contains("youtube.com") || url.contains("youtu.be")
}

/// Take the id segment following `marker`, up to the next delimiter.
fn after_marker(url: &str, marker: &str) -> Option<String> {
    let start = url.find(marker)? + marker.len();
    if start >= url.len() {
        return None;
    }
    let segment = &url[start..];
    let end = segment
        .find(|c| ['&', '#', '?', '/'].contains(&c))
        .unwrap_or(segment.len());
    Some(segment[..end].trim().to_string())
}

/// Platform ids are exactly 11 characters of [A-Za-z0-9_-].
fn is_valid_platform_id(id: &str) -> bool {
    id.len() == PLATFORM_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
