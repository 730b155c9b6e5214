//! Partial download artifacts.
//!
//! Downloaders write through `.part` siblings of the canonical file. A
//! partial that stops getting written to is an abandoned download; the
//! sweeper uses the scan here to find and clean them up.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use clipforge_models::{ContentKey, PARTIAL_SUFFIX};

use crate::error::StoreResult;

/// An on-disk marker of an in-flight, possibly abandoned, download.
#[derive(Debug, Clone)]
pub struct PartialArtifact {
    pub path: PathBuf,
    pub key: ContentKey,
    pub modified_at: SystemTime,
}

impl PartialArtifact {
    /// Time since the artifact was last written to.
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.modified_at)
            .unwrap_or(Duration::ZERO)
    }
}

/// List all partial artifacts in the downloads directory.
///
/// Files with a `.part` suffix whose base name does not follow the canonical
/// convention are skipped (with a log line, since they shouldn't be there).
pub async fn scan_partials(downloads_dir: &Path) -> StoreResult<Vec<PartialArtifact>> {
    let mut partials = Vec::new();

    let mut entries = tokio::fs::read_dir(downloads_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(PARTIAL_SUFFIX) {
            continue;
        }

        let Some(key) = ContentKey::parse_file_name(&name) else {
            debug!(file = %name, "Skipping partial with non-canonical name");
            continue;
        };

        let metadata = entry.metadata().await?;
        let modified_at = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        partials.push(PartialArtifact {
            path: entry.path(),
            key,
            modified_at,
        });
    }

    Ok(partials)
}

/// Delete the partial artifact and every sibling temp file for a key.
///
/// Siblings are files sharing the canonical name as a prefix (`.part`,
/// fragment temps, downloader state files). The completed canonical file
/// itself is never touched. Returns the number of files removed.
pub async fn remove_with_siblings(downloads_dir: &Path, key: &ContentKey) -> StoreResult<u32> {
    let canonical = key.canonical_name();
    let prefix = key.sibling_prefix();
    let mut removed = 0u32;

    let mut entries = tokio::fs::read_dir(downloads_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name == canonical || !name.starts_with(&prefix) {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!(file = %name, "Removed stale download artifact");
                removed += 1;
            }
            Err(e) => {
                warn!(file = %name, "Failed to remove stale artifact: {}", e);
            }
        }
    }

    Ok(removed)
}
