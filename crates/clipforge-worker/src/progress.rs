//! In-memory download progress tracking.
//!
//! A pure state holder: project id → progress snapshot, mutated only by the
//! orchestrator and read by any number of status pollers. Callers only ever
//! get clones, never references into the map. Not the source of truth for
//! completion: disk state wins, since this map is lost on restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::debug;

use clipforge_models::{DownloadPhase, DownloadProgress, ProjectId, VideoSource};

#[derive(Debug, Clone)]
struct Entry {
    progress: DownloadProgress,
    source: Option<VideoSource>,
}

/// Shared progress map.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<Mutex<HashMap<ProjectId, Entry>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new invocation for a project: 0%, initializing.
    pub fn begin(&self, project_id: ProjectId) {
        let mut map = self.inner.lock().expect("progress lock poisoned");
        map.insert(
            project_id,
            Entry {
                progress: DownloadProgress {
                    project_id,
                    percent: 0,
                    phase: DownloadPhase::Initializing,
                    started_at: Utc::now(),
                },
                source: None,
            },
        );
    }

    /// Record a phase transition.
    ///
    /// Percent is clamped to be non-decreasing within the invocation; a
    /// backend reporting a smaller value never moves the bar backwards.
    pub fn update(&self, project_id: ProjectId, percent: u8, phase: DownloadPhase) {
        let mut map = self.inner.lock().expect("progress lock poisoned");
        let entry = map.entry(project_id).or_insert_with(|| Entry {
            progress: DownloadProgress::pending(project_id),
            source: None,
        });

        let clamped = percent.clamp(entry.progress.percent, 100);
        if clamped != percent {
            debug!(
                project_id = %project_id,
                requested = percent,
                kept = clamped,
                "Ignoring backwards progress update"
            );
        }
        entry.progress.percent = clamped;
        entry.progress.phase = phase;
    }

    /// Terminal success: 100%, completed, with the video's origin recorded.
    pub fn complete(&self, project_id: ProjectId, source: VideoSource) {
        let mut map = self.inner.lock().expect("progress lock poisoned");
        let entry = map.entry(project_id).or_insert_with(|| Entry {
            progress: DownloadProgress::pending(project_id),
            source: None,
        });
        entry.progress.percent = 100;
        entry.progress.phase = DownloadPhase::Completed;
        entry.source = Some(source);
    }

    /// Terminal failure. Percent stays where it was; only completion may
    /// report 100.
    pub fn fail(&self, project_id: ProjectId) {
        let mut map = self.inner.lock().expect("progress lock poisoned");
        let entry = map.entry(project_id).or_insert_with(|| Entry {
            progress: DownloadProgress::pending(project_id),
            source: None,
        });
        entry.progress.phase = DownloadPhase::Failed;
    }

    /// Snapshot for a project; `{0, pending}` when unknown.
    pub fn snapshot(&self, project_id: ProjectId) -> DownloadProgress {
        let map = self.inner.lock().expect("progress lock poisoned");
        map.get(&project_id)
            .map(|e| e.progress.clone())
            .unwrap_or_else(|| DownloadProgress::pending(project_id))
    }

    /// Video origin recorded at completion, if any.
    pub fn source(&self, project_id: ProjectId) -> Option<VideoSource> {
        let map = self.inner.lock().expect("progress lock poisoned");
        map.get(&project_id).and_then(|e| e.source)
    }
}
