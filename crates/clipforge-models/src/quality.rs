//! Download quality selection.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Requested video quality for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[serde(rename = "240p")]
    P240,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Quality {
    /// Maximum frame height for this quality, used in downloader format
    /// filters (`best[height<=N]`).
    pub fn max_height(&self) -> u32 {
        match self {
            Quality::P240 => 240,
            Quality::P360 => 360,
            Quality::P480 => 480,
            Quality::P720 => 720,
            Quality::P1080 => 1080,
        }
    }

    /// The string form used in canonical filenames ("720p").
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::P240 => "240p",
            Quality::P360 => "360p",
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Quality {
    type Err = QualityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "240p" | "240" => Ok(Quality::P240),
            "360p" | "360" => Ok(Quality::P360),
            "480p" | "480" => Ok(Quality::P480),
            "720p" | "720" => Ok(Quality::P720),
            "1080p" | "1080" => Ok(Quality::P1080),
            _ => Err(QualityParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown quality: {0}")]
pub struct QualityParseError(String);
