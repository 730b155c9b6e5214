//! Project metadata records.
//!
//! Projects live in an external relational store; the engine only reads and
//! writes the narrow view modeled here.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::quality::Quality;

/// Numeric project identifier assigned by the external store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct ProjectId(pub i64);

impl ProjectId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProjectId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Externally-visible project status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Acquisition in progress.
    #[default]
    Processing,
    /// Source video available (own master or reference).
    Completed,
    /// Acquisition failed terminally.
    Failed,
    /// Batch clip transcoding in progress.
    ProcessingClips,
    /// All requested clips settled.
    ClipsReady,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Processing => "processing",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
            ProjectStatus::ProcessingClips => "processing_clips",
            ProjectStatus::ClipsReady => "clips_ready",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata snapshot captured when a video is acquired or shared.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct VideoDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// The project fields the engine reads.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub source_url: String,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub status: ProjectStatus,
    /// Resolved video path, pushed by the engine once available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_file_path: Option<String>,
    #[serde(default)]
    pub details: VideoDetails,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn new(id: ProjectId, source_url: impl Into<String>, quality: Quality) -> Self {
        Self {
            id,
            source_url: source_url.into(),
            quality,
            status: ProjectStatus::Processing,
            video_file_path: None,
            details: VideoDetails::default(),
            updated_at: Utc::now(),
        }
    }
}

/// The project fields the engine writes.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub status: Option<ProjectStatus>,
    pub video_file_path: Option<String>,
    pub details: Option<VideoDetails>,
}

impl ProjectUpdate {
    pub fn status(status: ProjectStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_video_path(mut self, path: impl Into<String>) -> Self {
        self.video_file_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: VideoDetails) -> Self {
        self.details = Some(details);
        self
    }
}
