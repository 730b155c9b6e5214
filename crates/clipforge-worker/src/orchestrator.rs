//! Download orchestrator.
//!
//! The central state machine of the acquisition engine:
//!
//! ```text
//! INIT -> CHECKING_CACHE -> { REUSE_MASTER | SHARE_IN_PROGRESS | FRESH_DOWNLOAD }
//!                        -> COMPLETED | FAILED
//! ```
//!
//! It decides *whether* to download (reference store lookup), *how* to
//! download (ordered backend fallback chain with per-attempt error
//! isolation), and verifies completion independently of what a backend
//! claims. The progress tracker reflects every phase transition.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use clipforge_media::backend::{backend_chain, DownloaderBackend, VideoInfo};
use clipforge_media::probe_duration;
use clipforge_media::MediaResult;
use clipforge_models::{
    CanonicalFile, ContentKey, DownloadPhase, ProjectId, ProjectStatus, ProjectUpdate, Quality,
    SourceId, VideoDetails, VideoSource,
};
use clipforge_store::{Existing, ProjectMetadataStore, ReferenceStore};

use crate::error::{WorkerError, WorkerResult};
use crate::progress::ProgressTracker;

const PROGRESS_CHECKING: u8 = 5;
const PROGRESS_DOWNLOADING: u8 = 10;
const PROGRESS_SHARING: u8 = 50;
const PROGRESS_FINALIZING: u8 = 90;

/// Factory producing the backend list for a selector. Swappable in tests.
type BackendFactory =
    Box<dyn Fn(&str) -> MediaResult<Vec<Arc<dyn DownloaderBackend>>> + Send + Sync>;

/// One acquisition request.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub project_id: ProjectId,
    pub url: String,
    pub quality: Quality,
    pub include_audio: bool,
    /// Backend selector: "auto" for the full chain, or a backend name to
    /// pin one and skip the fallback chain entirely.
    pub backend: String,
}

impl DownloadRequest {
    pub fn new(project_id: ProjectId, url: impl Into<String>) -> Self {
        Self {
            project_id,
            url: url.into(),
            quality: Quality::default(),
            include_audio: true,
            backend: "auto".to_string(),
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    fn content_key(&self) -> ContentKey {
        ContentKey::new(
            SourceId::from_url(&self.url),
            self.quality,
            self.include_audio,
        )
    }
}

/// Terminal result of one orchestrator invocation.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The project's video was already on disk; nothing to do.
    AlreadyAvailable { path: PathBuf },
    /// Another project's canonical file was reused through a new reference.
    Shared {
        path: PathBuf,
        reference_path: PathBuf,
    },
    /// A download for this key is in flight; caller should re-poll.
    SharedInProgress,
    /// A backend fetched a fresh canonical file.
    Downloaded {
        file: CanonicalFile,
        backend: &'static str,
    },
}

impl DownloadOutcome {
    /// Origin reported to status pollers; `None` while still in flight.
    pub fn source(&self) -> Option<VideoSource> {
        match self {
            DownloadOutcome::AlreadyAvailable { .. } => Some(VideoSource::Cached),
            DownloadOutcome::Shared { .. } => Some(VideoSource::Shared),
            DownloadOutcome::SharedInProgress => None,
            DownloadOutcome::Downloaded { .. } => Some(VideoSource::Fresh),
        }
    }

    /// Resolved video path, when terminal and successful.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            DownloadOutcome::AlreadyAvailable { path } => Some(path),
            DownloadOutcome::Shared { path, .. } => Some(path),
            DownloadOutcome::SharedInProgress => None,
            DownloadOutcome::Downloaded { file, .. } => Some(&file.path),
        }
    }
}

/// Removes the project from the in-flight set when an invocation ends.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<ProjectId>>>,
    project_id: ProjectId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.project_id);
        }
    }
}

/// Sequences cache lookup, backend fallback and reference creation.
pub struct DownloadOrchestrator {
    store: Arc<ReferenceStore>,
    projects: Arc<dyn ProjectMetadataStore>,
    tracker: ProgressTracker,
    backends: BackendFactory,
    in_flight: Arc<Mutex<HashSet<ProjectId>>>,
}

impl DownloadOrchestrator {
    pub fn new(
        store: Arc<ReferenceStore>,
        projects: Arc<dyn ProjectMetadataStore>,
        tracker: ProgressTracker,
    ) -> Self {
        Self {
            store,
            projects,
            tracker,
            backends: Box::new(|selector| backend_chain(selector)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replace the backend factory (tests inject fakes here).
    pub fn with_backend_factory(
        mut self,
        factory: impl Fn(&str) -> MediaResult<Vec<Arc<dyn DownloaderBackend>>> + Send + Sync + 'static,
    ) -> Self {
        self.backends = Box::new(factory);
        self
    }

    /// Shared progress tracker.
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Make the project's video available, downloading only if needed.
    ///
    /// At most one invocation per project runs at a time; a concurrent
    /// re-invocation degrades to [`DownloadOutcome::SharedInProgress`]
    /// instead of starting a duplicate download.
    pub async fn ensure_video(&self, request: &DownloadRequest) -> WorkerResult<DownloadOutcome> {
        let project_id = request.project_id;

        let Some(_guard) = self.try_begin(project_id) else {
            info!(project_id = %project_id, "Download already in flight for project");
            self.tracker
                .update(project_id, PROGRESS_SHARING, DownloadPhase::Sharing);
            return Ok(DownloadOutcome::SharedInProgress);
        };

        self.tracker.begin(project_id);
        let key = request.content_key();

        self.tracker
            .update(project_id, PROGRESS_CHECKING, DownloadPhase::CheckingCache);

        match self.store.find_existing(&key).await? {
            Existing::Master(path) => self.reuse_master(request, &key, path).await,
            Existing::Downloading(_) => {
                info!(
                    project_id = %project_id,
                    key = %key,
                    "Download in flight for key, sharing instead of duplicating"
                );
                self.tracker
                    .update(project_id, PROGRESS_SHARING, DownloadPhase::Sharing);
                Ok(DownloadOutcome::SharedInProgress)
            }
            Existing::Absent => self.fresh_download(request, &key).await,
        }
    }

    /// Restart acquisition for a project from its stored metadata.
    ///
    /// Used by the sweeper after deleting an abandoned partial. This is a
    /// restart, not a resume: no partial bytes survive.
    pub async fn restart(&self, project_id: ProjectId) -> WorkerResult<DownloadOutcome> {
        let record = self
            .projects
            .get(project_id)
            .await?
            .ok_or(WorkerError::ProjectNotFound(project_id))?;

        if let Err(e) = self
            .projects
            .update(project_id, ProjectUpdate::status(ProjectStatus::Processing))
            .await
        {
            warn!(project_id = %project_id, "Failed to mark project processing: {}", e);
        }

        let request = DownloadRequest::new(project_id, record.source_url)
            .with_quality(record.quality);
        self.ensure_video(&request).await
    }

    /// REUSE_MASTER: the key's canonical file exists; link instead of
    /// downloading.
    async fn reuse_master(
        &self,
        request: &DownloadRequest,
        key: &ContentKey,
        path: PathBuf,
    ) -> WorkerResult<DownloadOutcome> {
        let project_id = request.project_id;

        // The project's own earlier download shows up as a recorded file
        // path; anything else is another project's master.
        let record = self.projects.get(project_id).await.ok().flatten();
        let own = record
            .as_ref()
            .and_then(|r| r.video_file_path.as_deref())
            .map(|p| p == path.to_string_lossy())
            .unwrap_or(false);

        if own {
            info!(project_id = %project_id, path = %path.display(), "Project already has its video");
            self.tracker.complete(project_id, VideoSource::Cached);
            return Ok(DownloadOutcome::AlreadyAvailable { path });
        }

        let details = record.map(|r| r.details).unwrap_or_default();
        let original_project = self.original_project_for(key).await;
        let reference_path = self
            .store
            .create_reference(project_id, key, details, original_project)
            .await?;

        info!(
            project_id = %project_id,
            key = %key,
            "Reusing existing canonical file via reference"
        );
        self.tracker.complete(project_id, VideoSource::Shared);

        Ok(DownloadOutcome::Shared {
            path,
            reference_path,
        })
    }

    /// FRESH_DOWNLOAD: iterate the backend chain until one attempt verifies.
    async fn fresh_download(
        &self,
        request: &DownloadRequest,
        key: &ContentKey,
    ) -> WorkerResult<DownloadOutcome> {
        let project_id = request.project_id;
        let canonical = self.store.canonical_path(key);
        let chain = (self.backends)(&request.backend)?;

        let mut errors: Vec<String> = Vec::new();

        for backend in &chain {
            self.tracker
                .update(project_id, PROGRESS_DOWNLOADING, DownloadPhase::Downloading);

            info!(
                project_id = %project_id,
                backend = backend.name(),
                url = %request.url,
                "Attempting download"
            );

            match self.attempt(backend.as_ref(), request, key, &canonical).await {
                Ok(info) => {
                    return self.finalize(request, key, info, backend.name()).await;
                }
                Err(e) => {
                    warn!(
                        project_id = %project_id,
                        backend = backend.name(),
                        "Backend attempt failed: {}", e
                    );
                    errors.push(format!("{}: {}", backend.name(), e));
                    self.cleanup_failed_attempt(key, &canonical).await;
                }
            }
        }

        let message = format!(
            "All {} backend(s) failed: {}",
            chain.len(),
            errors.join("; ")
        );
        self.tracker.fail(project_id);
        if let Err(e) = self
            .projects
            .update(project_id, ProjectUpdate::status(ProjectStatus::Failed))
            .await
        {
            warn!(project_id = %project_id, "Failed to mark project failed: {}", e);
        }

        Err(WorkerError::download_failed(message))
    }

    /// One backend attempt: info, fetch, then independent verification.
    async fn attempt(
        &self,
        backend: &dyn DownloaderBackend,
        request: &DownloadRequest,
        key: &ContentKey,
        canonical: &PathBuf,
    ) -> WorkerResult<VideoInfo> {
        let info = backend
            .info(&request.url)
            .await
            .map_err(|e| WorkerError::download_failed(format!("info failed: {}", e)))?;

        backend
            .fetch(&request.url, canonical, request.quality, request.include_audio)
            .await
            .map_err(|e| WorkerError::download_failed(format!("fetch failed: {}", e)))?;

        self.verify_output(key, canonical).await?;
        Ok(info)
    }

    /// A backend's success claim is not trusted: the output must exist, be
    /// non-empty and have no leftover partial siblings.
    async fn verify_output(&self, key: &ContentKey, canonical: &PathBuf) -> WorkerResult<()> {
        if !canonical.exists() {
            return Err(WorkerError::download_failed(
                "verification failed: output file missing",
            ));
        }

        let size = tokio::fs::metadata(canonical).await?.len();
        if size == 0 {
            return Err(WorkerError::download_failed(
                "verification failed: output file is empty",
            ));
        }

        let leftovers = self
            .store
            .partials()
            .await?
            .into_iter()
            .filter(|p| &p.key == key)
            .count();
        if leftovers > 0 {
            return Err(WorkerError::download_failed(format!(
                "verification failed: {} leftover partial artifact(s)",
                leftovers
            )));
        }

        Ok(())
    }

    /// Leave a clean slate for the next backend in the chain.
    async fn cleanup_failed_attempt(&self, key: &ContentKey, canonical: &PathBuf) {
        if canonical.exists() {
            if let Err(e) = tokio::fs::remove_file(canonical).await {
                warn!(file = %canonical.display(), "Failed to remove bad output: {}", e);
            }
        }
        if let Err(e) = self.store.remove_partials(key).await {
            warn!(key = %key, "Failed to remove partial artifacts: {}", e);
        }
    }

    /// COMPLETED: record the canonical file and push metadata downstream.
    async fn finalize(
        &self,
        request: &DownloadRequest,
        key: &ContentKey,
        info: VideoInfo,
        backend_name: &'static str,
    ) -> WorkerResult<DownloadOutcome> {
        let project_id = request.project_id;
        self.tracker
            .update(project_id, PROGRESS_FINALIZING, DownloadPhase::Finalizing);

        let file = self.store.record_canonical(key).await?;

        let mut details = VideoDetails {
            title: (!info.title.is_empty()).then_some(info.title),
            duration_seconds: info.duration_seconds,
            file_size_bytes: Some(file.size_bytes),
            author: info.author,
            thumbnail_url: info.thumbnail_url,
        };

        // Backends without metadata support leave duration empty; ffprobe
        // fills it when available
        if details.duration_seconds.is_none() {
            match probe_duration(&file.path).await {
                Ok(duration) => details.duration_seconds = Some(duration),
                Err(e) => warn!(key = %key, "Duration probe failed: {}", e),
            }
        }

        if let Err(e) = self
            .projects
            .update(
                project_id,
                ProjectUpdate::status(ProjectStatus::Completed)
                    .with_video_path(file.path.to_string_lossy())
                    .with_details(details),
            )
            .await
        {
            warn!(project_id = %project_id, "Failed to push completion metadata: {}", e);
        }

        info!(
            project_id = %project_id,
            key = %key,
            backend = backend_name,
            size_bytes = file.size_bytes,
            "Download completed"
        );
        self.tracker.complete(project_id, VideoSource::Fresh);

        Ok(DownloadOutcome::Downloaded {
            file,
            backend: backend_name,
        })
    }

    /// First completed project for the key's source, recorded as the
    /// reference's origin when known.
    async fn original_project_for(&self, key: &ContentKey) -> Option<ProjectId> {
        self.projects
            .find_by_source(&key.source_id, ProjectStatus::Completed)
            .await
            .ok()?
            .into_iter()
            .map(|r| r.id)
            .min()
    }

    fn try_begin(&self, project_id: ProjectId) -> Option<InFlightGuard> {
        let mut set = self.in_flight.lock().expect("in-flight lock poisoned");
        if !set.insert(project_id) {
            return None;
        }
        Some(InFlightGuard {
            set: self.in_flight.clone(),
            project_id,
        })
    }
}
