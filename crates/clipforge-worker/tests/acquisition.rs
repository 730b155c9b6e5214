//! End-to-end acquisition and deduplication scenario.
//!
//! Project 1 requests a video nobody has: the backend chain runs and a
//! canonical file appears. Project 2 requests the same variant: it gets a
//! reference, no backend runs, and its video is available immediately.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use clipforge_media::backend::{DownloaderBackend, VideoInfo};
use clipforge_media::{MediaError, MediaResult};
use clipforge_models::{
    ContentKey, ProjectId, ProjectRecord, ProjectStatus, Quality, SourceId, VideoSource,
};
use clipforge_store::{
    MemoryProjectStore, ProjectMetadataStore, ReferenceStore, StorageLayout,
};
use clipforge_worker::{
    download_status, DownloadOrchestrator, DownloadOutcome, DownloadRequest, ProgressTracker,
};

const URL: &str = "https://youtube.com/watch?v=abc123def45";

/// Fails a configurable number of times, then writes the file.
struct FlakyBackend {
    name: &'static str,
    failures_left: AtomicUsize,
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl DownloaderBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn info(&self, _url: &str) -> MediaResult<VideoInfo> {
        Ok(VideoInfo {
            title: "Integration Video".to_string(),
            duration_seconds: Some(120.0),
            author: Some("someone".to_string()),
            thumbnail_url: None,
        })
    }

    async fn fetch(
        &self,
        _url: &str,
        destination: &Path,
        _quality: Quality,
        _include_audio: bool,
    ) -> MediaResult<PathBuf> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(MediaError::download_failed("transient failure"));
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(destination, b"integration video bytes").await?;
        Ok(destination.to_path_buf())
    }
}

struct Harness {
    orchestrator: DownloadOrchestrator,
    store: Arc<ReferenceStore>,
    projects: Arc<MemoryProjectStore>,
    tracker: ProgressTracker,
    fetches: Arc<AtomicUsize>,
    _dir: tempfile::TempDir,
}

async fn harness(chain_failures: &'static [usize]) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let projects = MemoryProjectStore::shared();
    let store = Arc::new(
        ReferenceStore::open(StorageLayout::new(dir.path()), projects.clone())
            .await
            .unwrap(),
    );
    let tracker = ProgressTracker::new();
    let fetches = Arc::new(AtomicUsize::new(0));

    let fetches_for_factory = fetches.clone();
    let orchestrator =
        DownloadOrchestrator::new(store.clone(), projects.clone(), tracker.clone())
            .with_backend_factory(move |_selector| {
                let names = ["first", "second", "third"];
                Ok(chain_failures
                    .iter()
                    .enumerate()
                    .map(|(i, failures)| {
                        Arc::new(FlakyBackend {
                            name: names[i],
                            failures_left: AtomicUsize::new(*failures),
                            fetches: fetches_for_factory.clone(),
                        }) as Arc<dyn DownloaderBackend>
                    })
                    .collect())
            });

    Harness {
        orchestrator,
        store,
        projects,
        tracker,
        fetches,
        _dir: dir,
    }
}

fn key() -> ContentKey {
    ContentKey::new(SourceId::from("abc123def45"), Quality::P720, true)
}

#[tokio::test]
async fn dedup_across_projects_end_to_end() {
    let h = harness(&[0]).await;

    for id in [1, 2] {
        h.projects
            .insert(ProjectRecord::new(ProjectId(id), URL, Quality::P720))
            .await;
    }

    // Project 1: nothing on disk, chain runs, canonical appears
    let outcome = h
        .orchestrator
        .ensure_video(&DownloadRequest::new(ProjectId(1), URL).with_quality(Quality::P720))
        .await
        .unwrap();
    assert_eq!(outcome.source(), Some(VideoSource::Fresh));

    let canonical = h.store.canonical_path(&key());
    assert!(canonical.exists());
    assert_eq!(h.fetches.load(Ordering::SeqCst), 1);

    // Exactly one canonical file exists for the key
    let mp4_count = std::fs::read_dir(canonical.parent().unwrap())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .ends_with(".mp4")
        })
        .count();
    assert_eq!(mp4_count, 1);

    // Project 2: same key resolves to a reference, no second download
    let outcome = h
        .orchestrator
        .ensure_video(&DownloadRequest::new(ProjectId(2), URL).with_quality(Quality::P720))
        .await
        .unwrap();

    let DownloadOutcome::Shared {
        path,
        reference_path,
    } = outcome
    else {
        panic!("expected shared outcome");
    };
    assert_eq!(path, canonical);
    assert!(reference_path.exists());
    assert_eq!(h.fetches.load(Ordering::SeqCst), 1);

    // Availability is immediate
    assert!(h.store.has_video(ProjectId(2)).await);
    let record = h.projects.get(ProjectId(2)).await.unwrap().unwrap();
    assert_eq!(record.status, ProjectStatus::Completed);

    // Status reports agree, with the right origin for each project
    let report1 = download_status(&h.store, &h.tracker, ProjectId(1)).await;
    assert!(report1.ready_for_editing);
    assert_eq!(report1.progress, 100);
    assert_eq!(report1.video.source, Some(VideoSource::Fresh));

    let report2 = download_status(&h.store, &h.tracker, ProjectId(2)).await;
    assert!(report2.ready_for_editing);
    assert_eq!(report2.video.source, Some(VideoSource::Shared));

    // Storage accounting sees one master and one reference
    let stats = h.store.stats().await.unwrap();
    assert_eq!(stats.master_files, 1);
    assert_eq!(stats.reference_files, 1);
}

#[tokio::test]
async fn chain_falls_through_to_third_backend() {
    let h = harness(&[usize::MAX, usize::MAX, 0]).await;
    h.projects
        .insert(ProjectRecord::new(ProjectId(1), URL, Quality::P720))
        .await;

    let outcome = h
        .orchestrator
        .ensure_video(&DownloadRequest::new(ProjectId(1), URL))
        .await
        .unwrap();

    let DownloadOutcome::Downloaded { backend, .. } = &outcome else {
        panic!("expected fresh download");
    };
    assert_eq!(*backend, "third");
    assert_eq!(outcome.source(), Some(VideoSource::Fresh));
}

#[tokio::test]
async fn progress_is_monotonic_through_an_acquisition() {
    let h = harness(&[0]).await;
    h.projects
        .insert(ProjectRecord::new(ProjectId(1), URL, Quality::P720))
        .await;

    let before = h.tracker.snapshot(ProjectId(1));
    assert_eq!(before.percent, 0);
    assert_eq!(before.phase.to_string(), "pending");

    h.orchestrator
        .ensure_video(&DownloadRequest::new(ProjectId(1), URL))
        .await
        .unwrap();

    let after = h.tracker.snapshot(ProjectId(1));
    assert_eq!(after.percent, 100);
    assert_eq!(after.phase.to_string(), "completed");
}
