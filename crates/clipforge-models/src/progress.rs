//! Download progress reporting.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::content::VideoSource;
use crate::project::ProjectId;

/// Phase of a long-running download, as seen by status pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPhase {
    /// No download has been started (the default answer for unknown projects).
    #[default]
    Pending,
    Initializing,
    CheckingCache,
    Downloading,
    /// Another invocation owns the in-flight download; this project shares it.
    Sharing,
    Finalizing,
    Completed,
    Failed,
}

impl DownloadPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadPhase::Pending => "pending",
            DownloadPhase::Initializing => "initializing",
            DownloadPhase::CheckingCache => "checking_cache",
            DownloadPhase::Downloading => "downloading",
            DownloadPhase::Sharing => "sharing",
            DownloadPhase::Finalizing => "finalizing",
            DownloadPhase::Completed => "completed",
            DownloadPhase::Failed => "failed",
        }
    }

    /// Terminal phases receive no further updates within an invocation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadPhase::Completed | DownloadPhase::Failed)
    }
}

impl std::fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of one project's download progress.
///
/// Memory-only: lost on restart. Disk state (the content reference store)
/// always wins when the two disagree.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadProgress {
    pub project_id: ProjectId,
    /// 0..=100, non-decreasing within one invocation.
    pub percent: u8,
    pub phase: DownloadPhase,
    pub started_at: DateTime<Utc>,
}

impl DownloadProgress {
    /// The canonical answer for a project with no recorded progress.
    pub fn pending(project_id: ProjectId) -> Self {
        Self {
            project_id,
            percent: 0,
            phase: DownloadPhase::Pending,
            started_at: Utc::now(),
        }
    }
}

/// Shape returned to status pollers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DownloadStatusReport {
    /// True once the video is resolvable on disk and progress is terminal.
    pub ready_for_editing: bool,
    pub status: String,
    pub progress: u8,
    pub video: VideoStatusDetail,
}

/// Nested `video` object of the status report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoStatusDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<VideoSource>,
}
