//! Stuck-download sweeper.
//!
//! Downloads abandoned mid-flight (worker crash, killed process) leave a
//! partial artifact that stops aging. This service scans for partials older
//! than a threshold, deletes them together with their sibling temp files,
//! and restarts acquisition for the owning projects through the
//! orchestrator. A restart discards partial bytes; nothing is resumed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use clipforge_models::{ProjectId, ProjectStatus};
use clipforge_store::{ProjectMetadataStore, ReferenceStore};

use crate::orchestrator::DownloadOrchestrator;

/// Env var disabling the sweeper loop.
const ENABLE_ENV: &str = "CLIPFORGE_ENABLE_SWEEPER";

/// Outcome of one sweep pass.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Partial artifacts seen.
    pub scanned: usize,
    /// Partials past the threshold (cleaned up).
    pub stale: usize,
    /// Projects restarted, each at most once per pass.
    pub restarted: Vec<ProjectId>,
}

/// Periodic scan for abandoned partial downloads.
pub struct StuckSweeper {
    store: Arc<ReferenceStore>,
    projects: Arc<dyn ProjectMetadataStore>,
    orchestrator: Arc<DownloadOrchestrator>,
    threshold: Duration,
    sweep_interval: Duration,
    enabled: bool,
}

impl StuckSweeper {
    pub fn new(
        store: Arc<ReferenceStore>,
        projects: Arc<dyn ProjectMetadataStore>,
        orchestrator: Arc<DownloadOrchestrator>,
        threshold: Duration,
        sweep_interval: Duration,
    ) -> Self {
        let enabled = std::env::var(ENABLE_ENV)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true); // Enabled by default

        Self {
            store,
            projects,
            orchestrator,
            threshold,
            sweep_interval,
            enabled,
        }
    }

    /// Run the sweep loop until the process exits.
    ///
    /// Spawn as a background task; errors are logged, never fatal.
    pub async fn run(&self) {
        if !self.enabled {
            info!("Stuck-download sweeper is disabled");
            return;
        }

        info!(
            interval_secs = self.sweep_interval.as_secs(),
            threshold_secs = self.threshold.as_secs(),
            "Starting stuck-download sweeper"
        );

        let mut ticker = interval(self.sweep_interval);

        loop {
            ticker.tick().await;

            if let Err(e) = self.sweep_once().await {
                error!("Stuck-download sweep error: {}", e);
            }
        }
    }

    /// Run a single sweep pass.
    ///
    /// Idempotent for partials younger than the threshold: they are left
    /// untouched. Each affected project is restarted at most once per pass.
    pub async fn sweep_once(&self) -> anyhow::Result<SweepReport> {
        let partials = self.store.partials().await?;
        let mut report = SweepReport {
            scanned: partials.len(),
            ..Default::default()
        };

        let mut restarted: HashSet<ProjectId> = HashSet::new();

        for partial in partials {
            if partial.age() < self.threshold {
                continue;
            }
            report.stale += 1;

            warn!(
                key = %partial.key,
                age_secs = partial.age().as_secs(),
                "Detected stuck download, cleaning up"
            );

            let removed = self.store.remove_partials(&partial.key).await?;
            info!(key = %partial.key, removed, "Removed stale download artifacts");

            // The owner is whichever project asked for this source and is
            // still waiting on it
            let owners = self
                .projects
                .find_by_source(&partial.key.source_id, ProjectStatus::Processing)
                .await?;

            if owners.is_empty() {
                info!(key = %partial.key, "No processing project owns this partial");
                continue;
            }

            for owner in owners {
                if !restarted.insert(owner.id) {
                    continue;
                }

                info!(project_id = %owner.id, key = %partial.key, "Restarting stuck download");
                match self.orchestrator.restart(owner.id).await {
                    Ok(_) => report.restarted.push(owner.id),
                    Err(e) => {
                        error!(project_id = %owner.id, "Restart failed: {}", e);
                    }
                }
            }
        }

        if report.stale > 0 {
            info!(
                scanned = report.scanned,
                stale = report.stale,
                restarted = report.restarted.len(),
                "Sweep pass complete"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use clipforge_media::backend::{DownloaderBackend, VideoInfo};
    use clipforge_media::MediaResult;
    use clipforge_models::{ContentKey, ProjectRecord, Quality, SourceId};
    use clipforge_store::{MemoryProjectStore, StorageLayout};

    use crate::orchestrator::DownloadRequest;
    use crate::progress::ProgressTracker;

    const URL: &str = "https://youtube.com/watch?v=abc123def45";

    struct CountingBackend {
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DownloaderBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }
        async fn info(&self, _url: &str) -> MediaResult<VideoInfo> {
            Ok(VideoInfo {
                title: "Video".to_string(),
                duration_seconds: Some(5.0),
                author: None,
                thumbnail_url: None,
            })
        }
        async fn fetch(
            &self,
            _url: &str,
            destination: &std::path::Path,
            _quality: Quality,
            _include_audio: bool,
        ) -> MediaResult<std::path::PathBuf> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(destination, b"video").await?;
            Ok(destination.to_path_buf())
        }
    }

    struct Fixture {
        sweeper: StuckSweeper,
        store: Arc<ReferenceStore>,
        projects: Arc<MemoryProjectStore>,
        fetches: Arc<AtomicUsize>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(threshold: Duration) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let projects = MemoryProjectStore::shared();
        let store = Arc::new(
            ReferenceStore::open(StorageLayout::new(dir.path()), projects.clone())
                .await
                .unwrap(),
        );
        let fetches = Arc::new(AtomicUsize::new(0));

        let fetches_for_factory = fetches.clone();
        let orchestrator = Arc::new(
            DownloadOrchestrator::new(store.clone(), projects.clone(), ProgressTracker::new())
                .with_backend_factory(move |_| {
                    Ok(vec![Arc::new(CountingBackend {
                        fetches: fetches_for_factory.clone(),
                    }) as Arc<dyn DownloaderBackend>])
                }),
        );

        let sweeper = StuckSweeper::new(
            store.clone(),
            projects.clone(),
            orchestrator,
            threshold,
            Duration::from_secs(60),
        );

        Fixture {
            sweeper,
            store,
            projects,
            fetches,
            _dir: dir,
        }
    }

    fn key() -> ContentKey {
        ContentKey::new(SourceId::from("abc123def45"), Quality::P720, true)
    }

    async fn write_partial(store: &ReferenceStore) -> std::path::PathBuf {
        let partial = store.canonical_path(&key()).with_extension("mp4.part");
        tokio::fs::write(&partial, b"half a video").await.unwrap();
        partial
    }

    #[tokio::test]
    async fn test_young_partial_is_left_untouched() {
        let fx = fixture(Duration::from_secs(300)).await;
        let partial = write_partial(&fx.store).await;

        let report = fx.sweeper.sweep_once().await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.stale, 0);
        assert!(report.restarted.is_empty());
        assert!(partial.exists());

        // A second pass changes nothing
        let report = fx.sweeper.sweep_once().await.unwrap();
        assert_eq!(report.stale, 0);
        assert!(partial.exists());
    }

    #[tokio::test]
    async fn test_stale_partial_is_cleaned_and_owner_restarted_once() {
        // Zero threshold: every partial counts as stuck
        let fx = fixture(Duration::ZERO).await;
        let partial = write_partial(&fx.store).await;

        fx.projects
            .insert(ProjectRecord::new(ProjectId(1), URL, Quality::P720))
            .await;

        let report = fx.sweeper.sweep_once().await.unwrap();
        assert_eq!(report.stale, 1);
        assert_eq!(report.restarted, vec![ProjectId(1)]);
        assert!(!partial.exists());
        // Exactly one restart -> exactly one backend fetch
        assert_eq!(fx.fetches.load(Ordering::SeqCst), 1);

        // The restart completed the project, so the next pass is a no-op
        let report = fx.sweeper.sweep_once().await.unwrap();
        assert_eq!(report.stale, 0);
        assert!(report.restarted.is_empty());
        assert_eq!(fx.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_partial_without_owner_is_only_cleaned() {
        let fx = fixture(Duration::ZERO).await;
        let partial = write_partial(&fx.store).await;

        // A completed project with the same source does not count as owner
        let mut record = ProjectRecord::new(ProjectId(5), URL, Quality::P720);
        record.status = ProjectStatus::Completed;
        fx.projects.insert(record).await;

        let report = fx.sweeper.sweep_once().await.unwrap();
        assert_eq!(report.stale, 1);
        assert!(report.restarted.is_empty());
        assert!(!partial.exists());
        assert_eq!(fx.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_completion_leaves_no_partials() {
        // After a successful restart the canonical exists and no partial
        // remains for the key
        let fx = fixture(Duration::ZERO).await;
        write_partial(&fx.store).await;
        fx.projects
            .insert(ProjectRecord::new(ProjectId(1), URL, Quality::P720))
            .await;

        fx.sweeper.sweep_once().await.unwrap();

        assert!(fx.store.canonical_path(&key()).exists());
        assert!(fx.store.partials().await.unwrap().is_empty());
    }
}
