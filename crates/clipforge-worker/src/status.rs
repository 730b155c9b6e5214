//! Status report assembly for pollers.
//!
//! Disk state beats the in-memory tracker: progress is lost on restart while
//! files survive, so a resolvable video is reported complete no matter what
//! the tracker remembers.

use clipforge_models::{
    DownloadPhase, DownloadStatusReport, ProjectId, VideoSource,
};
use clipforge_models::progress::VideoStatusDetail;
use clipforge_store::ReferenceStore;

use crate::progress::ProgressTracker;

/// Build the status report for a project.
pub async fn download_status(
    store: &ReferenceStore,
    tracker: &ProgressTracker,
    project_id: ProjectId,
) -> DownloadStatusReport {
    let resolved = store.resolve_path(project_id).await;
    let snapshot = tracker.snapshot(project_id);

    if resolved.is_some() {
        // Memory may disagree (e.g. after a restart); the file wins
        let source = tracker.source(project_id).unwrap_or(if store.has_reference(project_id) {
            VideoSource::Shared
        } else {
            VideoSource::Cached
        });

        return DownloadStatusReport {
            ready_for_editing: true,
            status: DownloadPhase::Completed.to_string(),
            progress: 100,
            video: VideoStatusDetail {
                source: Some(source),
            },
        };
    }

    DownloadStatusReport {
        ready_for_editing: false,
        status: snapshot.phase.to_string(),
        progress: snapshot.percent,
        video: VideoStatusDetail {
            source: tracker.source(project_id),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clipforge_models::{ContentKey, Quality, SourceId};
    use clipforge_store::{MemoryProjectStore, StorageLayout};

    async fn store(root: &std::path::Path) -> ReferenceStore {
        ReferenceStore::open(StorageLayout::new(root), MemoryProjectStore::shared())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_project_reports_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let tracker = ProgressTracker::new();

        let report = download_status(&store, &tracker, ProjectId(1)).await;
        assert!(!report.ready_for_editing);
        assert_eq!(report.status, "pending");
        assert_eq!(report.progress, 0);
        assert!(report.video.source.is_none());
    }

    #[tokio::test]
    async fn test_in_flight_progress_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let tracker = ProgressTracker::new();

        tracker.begin(ProjectId(1));
        tracker.update(ProjectId(1), 40, DownloadPhase::Downloading);

        let report = download_status(&store, &tracker, ProjectId(1)).await;
        assert!(!report.ready_for_editing);
        assert_eq!(report.status, "downloading");
        assert_eq!(report.progress, 40);
    }

    #[tokio::test]
    async fn test_disk_state_overrides_stale_memory() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let tracker = ProgressTracker::new();

        // Tracker thinks the project failed, but the legacy file is on disk
        tracker.begin(ProjectId(9));
        tracker.fail(ProjectId(9));

        let legacy = dir.path().join("downloads").join("project_9_full.mp4");
        std::fs::write(&legacy, b"bytes").unwrap();

        let report = download_status(&store, &tracker, ProjectId(9)).await;
        assert!(report.ready_for_editing);
        assert_eq!(report.status, "completed");
        assert_eq!(report.progress, 100);
        assert_eq!(report.video.source, Some(VideoSource::Cached));
    }

    #[tokio::test]
    async fn test_shared_project_reports_shared_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path()).await;
        let tracker = ProgressTracker::new();

        let key = ContentKey::new(SourceId::from("abc123def45"), Quality::P720, true);
        std::fs::write(store.canonical_path(&key), b"bytes").unwrap();
        store
            .create_reference(ProjectId(2), &key, Default::default(), None)
            .await
            .unwrap();

        let report = download_status(&store, &tracker, ProjectId(2)).await;
        assert!(report.ready_for_editing);
        assert_eq!(report.video.source, Some(VideoSource::Shared));
    }
}
