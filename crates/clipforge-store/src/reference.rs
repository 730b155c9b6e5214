//! Content reference store.
//!
//! One canonical file per [`ContentKey`] lives in the downloads directory;
//! every additional project wanting the same variant gets a reference record
//! instead of a second copy. Resolution of "where is project N's video"
//! walks an explicit fallback chain because naming conventions changed over
//! the system's history.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use clipforge_models::{
    CanonicalFile, ContentKey, ProjectId, ProjectStatus, ProjectUpdate, Quality, SourceId,
    VideoDetails,
};

use crate::error::{StoreError, StoreResult};
use crate::layout::StorageLayout;
use crate::partial::{self, PartialArtifact};
use crate::project::ProjectMetadataStore;

/// What the downloads directory holds for a content key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existing {
    /// A completed canonical file. Always wins over a partial.
    Master(PathBuf),
    /// Only a partial artifact: a download is (presumed) in flight.
    Downloading(PathBuf),
    /// Nothing on disk for this key.
    Absent,
}

/// Reference record written as `project_{id}_ref.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub project_id: ProjectId,
    /// File name of the canonical file in the downloads directory.
    pub reference_to: String,
    /// Project that originally downloaded the canonical file, when known.
    pub original_project: Option<ProjectId>,
    pub source_id: SourceId,
    pub quality: Quality,
    pub has_audio: bool,
    pub created_at: DateTime<Utc>,
    pub metadata: VideoDetails,
}

/// Storage usage summary across masters and references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStats {
    pub master_files: usize,
    pub reference_files: usize,
    pub total_projects: usize,
    pub total_size_bytes: u64,
    /// Share of projects served without their own copy, when any exist.
    pub space_saved_percent: Option<f64>,
}

/// Owns the canonical-file and reference namespaces.
pub struct ReferenceStore {
    layout: StorageLayout,
    projects: Arc<dyn ProjectMetadataStore>,
}

impl ReferenceStore {
    /// Open the store, creating its directories.
    pub async fn open(
        layout: StorageLayout,
        projects: Arc<dyn ProjectMetadataStore>,
    ) -> StoreResult<Self> {
        layout.ensure().await?;
        Ok(Self { layout, projects })
    }

    /// Absolute path a canonical file for `key` would live at.
    pub fn canonical_path(&self, key: &ContentKey) -> PathBuf {
        self.layout.downloads_dir().join(key.canonical_name())
    }

    fn reference_path(&self, project_id: ProjectId) -> PathBuf {
        self.layout
            .references_dir()
            .join(format!("project_{}_ref.json", project_id))
    }

    /// Check what exists on disk for a content key.
    pub async fn find_existing(&self, key: &ContentKey) -> StoreResult<Existing> {
        let canonical = self.canonical_path(key);
        if canonical.exists() {
            debug!(key = %key, "Found completed canonical file");
            return Ok(Existing::Master(canonical));
        }

        // Any file sharing the partial prefix counts as in-flight
        // (downloaders append fragment suffixes to the `.part` name)
        let partial_prefix = key.partial_name();
        let mut entries = tokio::fs::read_dir(self.layout.downloads_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&partial_prefix) {
                debug!(key = %key, "Found in-flight partial artifact");
                return Ok(Existing::Downloading(
                    self.layout.downloads_dir().join(&partial_prefix),
                ));
            }
        }

        debug!(key = %key, "No existing video for key");
        Ok(Existing::Absent)
    }

    /// Record that a project shares an existing canonical file.
    ///
    /// Idempotent: an existing reference for the project is left untouched
    /// and its path returned. Otherwise writes the record and pushes the
    /// resolved path + completed status into the project metadata store, so
    /// downstream status and streaming queries need no re-resolution. The
    /// project becomes externally "available" with no bytes copied.
    pub async fn create_reference(
        &self,
        project_id: ProjectId,
        key: &ContentKey,
        metadata: VideoDetails,
        original_project: Option<ProjectId>,
    ) -> StoreResult<PathBuf> {
        let reference_path = self.reference_path(project_id);
        if reference_path.exists() {
            debug!(project_id = %project_id, "Reference already exists, keeping it");
            return Ok(reference_path);
        }

        let record = ReferenceRecord {
            project_id,
            reference_to: key.canonical_name(),
            original_project,
            source_id: key.source_id.clone(),
            quality: key.quality,
            has_audio: key.has_audio,
            created_at: Utc::now(),
            metadata: metadata.clone(),
        };

        let json = serde_json::to_string_pretty(&record)?;
        tokio::fs::write(&reference_path, json).await?;

        let canonical = self.canonical_path(key);
        info!(
            project_id = %project_id,
            reference_to = %record.reference_to,
            "Created video reference"
        );

        // Non-critical: the reference record on disk is the source of truth,
        // the metadata push is a convenience for downstream queries
        if let Err(e) = self
            .projects
            .update(
                project_id,
                ProjectUpdate::status(ProjectStatus::Completed)
                    .with_video_path(canonical.to_string_lossy())
                    .with_details(metadata),
            )
            .await
        {
            warn!(
                project_id = %project_id,
                "Failed to push reference path to metadata store: {}", e
            );
        }

        Ok(reference_path)
    }

    /// Record a freshly downloaded canonical file.
    pub async fn record_canonical(&self, key: &ContentKey) -> StoreResult<CanonicalFile> {
        let path = self.canonical_path(key);
        let metadata = tokio::fs::metadata(&path).await?;
        Ok(CanonicalFile {
            key: key.clone(),
            path,
            size_bytes: metadata.len(),
            created_at: Utc::now(),
        })
    }

    /// Resolve the actual video file path for a project.
    ///
    /// First-match-wins strategy pipeline; each step covers a historical
    /// naming convention and falls through on any miss or error:
    /// 1. reference record → canonical file (if it still exists)
    /// 2. legacy direct per-project file
    /// 3. metadata lookup → re-derived canonical name
    /// 4. directory scan for any file in the canonical convention
    pub async fn resolve_path(&self, project_id: ProjectId) -> Option<PathBuf> {
        if let Some(path) = self.resolve_via_reference(project_id).await {
            return Some(path);
        }
        if let Some(path) = self.resolve_via_legacy(project_id).await {
            return Some(path);
        }
        if let Some(path) = self.resolve_via_metadata(project_id).await {
            return Some(path);
        }
        self.resolve_via_scan().await
    }

    /// Whether the project has a resolvable video (own master or reference).
    pub async fn has_video(&self, project_id: ProjectId) -> bool {
        self.resolve_path(project_id).await.is_some()
    }

    /// Whether a reference record exists for the project.
    pub fn has_reference(&self, project_id: ProjectId) -> bool {
        self.reference_path(project_id).exists()
    }

    /// List in-flight partial artifacts.
    pub async fn partials(&self) -> StoreResult<Vec<PartialArtifact>> {
        partial::scan_partials(&self.layout.downloads_dir()).await
    }

    /// Remove the partial artifact and sibling temps for a key.
    pub async fn remove_partials(&self, key: &ContentKey) -> StoreResult<u32> {
        partial::remove_with_siblings(&self.layout.downloads_dir(), key).await
    }

    /// Storage usage across masters and references.
    pub async fn stats(&self) -> StoreResult<StorageStats> {
        let mut master_files = 0usize;
        let mut total_size_bytes = 0u64;

        let mut entries = tokio::fs::read_dir(self.layout.downloads_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".mp4") {
                master_files += 1;
                total_size_bytes += entry.metadata().await?.len();
            }
        }

        let mut reference_files = 0usize;
        let mut entries = tokio::fs::read_dir(self.layout.references_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().ends_with(".json") {
                reference_files += 1;
            }
        }

        let total_projects = master_files + reference_files;
        let space_saved_percent = (reference_files > 0).then(|| {
            (reference_files as f64 / total_projects as f64) * 100.0
        });

        Ok(StorageStats {
            master_files,
            reference_files,
            total_projects,
            total_size_bytes,
            space_saved_percent,
        })
    }

    /// Step 1: reference record pointing at a still-existing canonical.
    async fn resolve_via_reference(&self, project_id: ProjectId) -> Option<PathBuf> {
        let reference_path = self.reference_path(project_id);
        if !reference_path.exists() {
            return None;
        }

        let record = match self.read_reference(&reference_path).await {
            Ok(record) => record,
            Err(e) => {
                warn!(project_id = %project_id, "Unreadable reference record: {}", e);
                return None;
            }
        };

        let canonical = self.layout.downloads_dir().join(&record.reference_to);
        if canonical.exists() {
            Some(canonical)
        } else {
            // Canonical was evicted; never hand out a dangling path
            warn!(
                project_id = %project_id,
                reference_to = %record.reference_to,
                "Reference points at a missing canonical file, falling through"
            );
            None
        }
    }

    /// Step 2: legacy `project_{id}_full.mp4` convention.
    async fn resolve_via_legacy(&self, project_id: ProjectId) -> Option<PathBuf> {
        let direct = self
            .layout
            .downloads_dir()
            .join(format!("project_{}_full.mp4", project_id));
        direct.exists().then_some(direct)
    }

    /// Step 3: re-derive the canonical name from stored project metadata.
    async fn resolve_via_metadata(&self, project_id: ProjectId) -> Option<PathBuf> {
        let record = match self.projects.get(project_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!(project_id = %project_id, "Metadata lookup failed: {}", e);
                return None;
            }
        };

        let key = ContentKey::new(
            SourceId::from_url(&record.source_url),
            record.quality,
            true,
        );
        let path = self.canonical_path(&key);
        path.exists().then_some(path)
    }

    /// Step 4: last resort, any file in the default canonical convention.
    async fn resolve_via_scan(&self) -> Option<PathBuf> {
        let mut entries = tokio::fs::read_dir(self.layout.downloads_dir()).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(key) = ContentKey::parse_file_name(&name) {
                if !name.ends_with(".part") && key.quality == Quality::default() && key.has_audio {
                    return Some(entry.path());
                }
            }
        }
        None
    }

    async fn read_reference(&self, path: &PathBuf) -> StoreResult<ReferenceRecord> {
        let json = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&json)
            .map_err(|e| StoreError::invalid_reference(path.clone(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::MemoryProjectStore;
    use clipforge_models::ProjectRecord;

    fn key() -> ContentKey {
        ContentKey::new(SourceId::from("abc123def45"), Quality::P720, true)
    }

    async fn store(root: &std::path::Path) -> (ReferenceStore, Arc<MemoryProjectStore>) {
        let projects = MemoryProjectStore::shared();
        let store = ReferenceStore::open(StorageLayout::new(root), projects.clone())
            .await
            .unwrap();
        (store, projects)
    }

    fn write_canonical(store: &ReferenceStore, key: &ContentKey) -> PathBuf {
        let path = store.canonical_path(key);
        std::fs::write(&path, b"video bytes").unwrap();
        path
    }

    #[tokio::test]
    async fn test_find_existing_prefers_master_over_partial() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path()).await;
        let k = key();

        assert_eq!(store.find_existing(&k).await.unwrap(), Existing::Absent);

        let partial = store.layout.downloads_dir().join(k.partial_name());
        std::fs::write(&partial, b"half").unwrap();
        assert!(matches!(
            store.find_existing(&k).await.unwrap(),
            Existing::Downloading(_)
        ));

        let canonical = write_canonical(&store, &k);
        assert_eq!(
            store.find_existing(&k).await.unwrap(),
            Existing::Master(canonical)
        );
    }

    #[tokio::test]
    async fn test_create_reference_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (store, projects) = store(dir.path()).await;
        let k = key();
        write_canonical(&store, &k);

        projects
            .insert(ProjectRecord::new(
                ProjectId(2),
                "https://youtu.be/abc123def45",
                Quality::P720,
            ))
            .await;

        let first = store
            .create_reference(ProjectId(2), &k, VideoDetails::default(), Some(ProjectId(1)))
            .await
            .unwrap();
        let recorded = std::fs::read_to_string(&first).unwrap();

        let second = store
            .create_reference(ProjectId(2), &k, VideoDetails::default(), None)
            .await
            .unwrap();
        assert_eq!(first, second);
        // Re-invocation is a no-op: the original record survives byte-for-byte
        assert_eq!(std::fs::read_to_string(&second).unwrap(), recorded);

        // Metadata store saw the resolved path and completed status
        let rec = projects.get(ProjectId(2)).await.unwrap().unwrap();
        assert_eq!(rec.status, ProjectStatus::Completed);
        assert!(rec.video_file_path.unwrap().ends_with(&k.canonical_name()));
    }

    #[tokio::test]
    async fn test_resolve_via_reference_and_dangling_fallthrough() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path()).await;
        let k = key();
        let canonical = write_canonical(&store, &k);

        store
            .create_reference(ProjectId(3), &k, VideoDetails::default(), None)
            .await
            .unwrap();

        assert_eq!(store.resolve_path(ProjectId(3)).await, Some(canonical.clone()));
        assert!(store.has_video(ProjectId(3)).await);

        // Evict the canonical: resolution must not return the dangling path
        std::fs::remove_file(&canonical).unwrap();
        assert_eq!(store.resolve_path(ProjectId(3)).await, None);
        assert!(!store.has_video(ProjectId(3)).await);
    }

    #[tokio::test]
    async fn test_resolve_via_legacy_path() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path()).await;

        let legacy = store.layout.downloads_dir().join("project_9_full.mp4");
        std::fs::write(&legacy, b"old bytes").unwrap();

        assert_eq!(store.resolve_path(ProjectId(9)).await, Some(legacy));
    }

    #[tokio::test]
    async fn test_resolve_via_metadata_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let (store, projects) = store(dir.path()).await;
        let k = key();
        let canonical = write_canonical(&store, &k);

        // No reference, no legacy file; only the stored source URL links them
        projects
            .insert(ProjectRecord::new(
                ProjectId(4),
                "https://youtube.com/watch?v=abc123def45",
                Quality::P720,
            ))
            .await;

        assert_eq!(store.resolve_path(ProjectId(4)).await, Some(canonical));
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path()).await;
        let k = key();
        write_canonical(&store, &k);
        store
            .create_reference(ProjectId(5), &k, VideoDetails::default(), None)
            .await
            .unwrap();

        let first = store.resolve_path(ProjectId(5)).await;
        let second = store.resolve_path(ProjectId(5)).await;
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[tokio::test]
    async fn test_stats_counts_masters_and_references() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path()).await;
        let k = key();
        write_canonical(&store, &k);
        store
            .create_reference(ProjectId(6), &k, VideoDetails::default(), None)
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.master_files, 1);
        assert_eq!(stats.reference_files, 1);
        assert_eq!(stats.total_projects, 2);
        assert!(stats.total_size_bytes > 0);
        assert_eq!(stats.space_saved_percent, Some(50.0));
    }
}
