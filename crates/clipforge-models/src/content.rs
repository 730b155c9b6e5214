//! Content keys and canonical file naming.
//!
//! A [`ContentKey`] identifies one distinct download variant: the same source
//! at the same quality with or without audio. Exactly one canonical file may
//! exist on disk per key; every other project wanting the same variant gets a
//! reference instead of a second copy.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::quality::Quality;
use crate::source::SourceId;

/// Suffix marking an in-flight (possibly abandoned) download.
pub const PARTIAL_SUFFIX: &str = ".part";

/// (source, quality, audio) tuple identifying one canonical file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ContentKey {
    pub source_id: SourceId,
    pub quality: Quality,
    pub has_audio: bool,
}

impl ContentKey {
    pub fn new(source_id: SourceId, quality: Quality, has_audio: bool) -> Self {
        Self {
            source_id,
            quality,
            has_audio,
        }
    }

    /// Canonical file name: `{source_id}_{quality}_{has_audio}.mp4`.
    pub fn canonical_name(&self) -> String {
        format!("{}_{}_{}.mp4", self.source_id, self.quality, self.has_audio)
    }

    /// Partial-artifact name for this key (`.part` sibling of the canonical).
    pub fn partial_name(&self) -> String {
        format!("{}{}", self.canonical_name(), PARTIAL_SUFFIX)
    }

    /// Prefix shared by the canonical file and all of its in-flight temp
    /// siblings (`{source_id}_{quality}_{has_audio}.mp4*`).
    pub fn sibling_prefix(&self) -> String {
        self.canonical_name()
    }

    /// Parse a key back out of a canonical or partial file name.
    ///
    /// Returns `None` for names that do not follow the convention.
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let base = name.strip_suffix(PARTIAL_SUFFIX).unwrap_or(name);
        let stem = base.strip_suffix(".mp4")?;

        // Rightmost two `_` segments are quality and audio; the source id may
        // itself contain underscores.
        let (rest, audio_part) = stem.rsplit_once('_')?;
        let (source_part, quality_part) = rest.rsplit_once('_')?;

        let has_audio = match audio_part {
            "true" => true,
            "false" => false,
            _ => return None,
        };
        let quality = quality_part.parse().ok()?;
        if source_part.is_empty() {
            return None;
        }

        Some(Self {
            source_id: SourceId::from_string(source_part),
            quality,
            has_audio,
        })
    }
}

impl fmt::Display for ContentKey {
    /// Canonical stem, so log lines read naturally.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.source_id, self.quality, self.has_audio)
    }
}

/// The one physical video file stored for a content key.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalFile {
    pub key: ContentKey,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Where a project's video came from, as reported to status pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoSource {
    /// Downloaded by a backend for this project.
    Fresh,
    /// Reference to another project's canonical file.
    Shared,
    /// The project's own file was already on disk.
    Cached,
}

impl VideoSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoSource::Fresh => "fresh",
            VideoSource::Shared => "shared",
            VideoSource::Cached => "cached",
        }
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ContentKey {
        ContentKey::new(SourceId::from("dQw4w9WgXcQ"), Quality::P720, true)
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(key().canonical_name(), "dQw4w9WgXcQ_720p_true.mp4");
        assert_eq!(key().partial_name(), "dQw4w9WgXcQ_720p_true.mp4.part");
    }

    #[test]
    fn test_parse_round_trip() {
        let k = key();
        assert_eq!(ContentKey::parse_file_name(&k.canonical_name()), Some(k.clone()));
        assert_eq!(ContentKey::parse_file_name(&k.partial_name()), Some(k));
    }

    #[test]
    fn test_parse_source_with_underscores() {
        let k = ContentKey::new(SourceId::from("ab_cd_ef"), Quality::P480, false);
        assert_eq!(
            ContentKey::parse_file_name("ab_cd_ef_480p_false.mp4"),
            Some(k)
        );
    }

    #[test]
    fn test_parse_rejects_non_canonical_names() {
        assert_eq!(ContentKey::parse_file_name("project_7_full.mp4"), None);
        assert_eq!(ContentKey::parse_file_name("video.mp4"), None);
        assert_eq!(ContentKey::parse_file_name("a_720p_maybe.mp4"), None);
        assert_eq!(ContentKey::parse_file_name("a_999p_true.mp4"), None);
    }
}
