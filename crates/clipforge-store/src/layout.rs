//! On-disk storage layout.

use std::path::{Path, PathBuf};

use crate::error::StoreResult;

/// Directory layout under a storage root.
///
/// The layout is a contract, not caller-negotiable: canonical files and their
/// partial siblings live in `downloads`, one JSON record per referencing
/// project lives in `references`, the secondary cache in `cache`, clip
/// outputs in `clips`.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create all directories. Idempotent.
    pub async fn ensure(&self) -> StoreResult<()> {
        for dir in [
            self.downloads_dir(),
            self.references_dir(),
            self.cache_dir(),
            self.clips_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    pub fn references_dir(&self) -> PathBuf {
        self.root.join("references")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn clips_dir(&self) -> PathBuf {
        self.root.join("clips")
    }
}
