//! Local disk cache for finished video files.
//!
//! A simpler, secondary store next to the reference store: finished files
//! keyed by content key, used for pre-transcode scratch copies. Bounded by
//! age and total size; eviction is least-accessed-first down to a watermark.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use clipforge_models::ContentKey;

use crate::error::StoreResult;

/// Index file name inside the cache directory.
const INDEX_FILE: &str = "cache_index.json";

/// Maximum total cache size (5 GiB).
const MAX_CACHE_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum entry age in days.
const MAX_CACHE_AGE_DAYS: i64 = 30;

/// Size eviction stops once usage drops to this share of the cap.
const SIZE_WATERMARK: f64 = 0.8;

/// One cached file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: ContentKey,
    pub file_name: String,
    pub size_bytes: u64,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
}

/// Cache usage summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
}

/// Age/size-bounded cache of finished video files.
pub struct DiskCache {
    dir: PathBuf,
    index: Mutex<HashMap<String, CacheEntry>>,
    max_size: u64,
    max_age: Duration,
}

impl DiskCache {
    /// Open the cache at `dir`, loading the index if present.
    ///
    /// An unreadable index starts the cache fresh rather than failing.
    pub async fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let index_path = dir.join(INDEX_FILE);
        let index = match tokio::fs::read_to_string(&index_path).await {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(index) => index,
                Err(e) => {
                    warn!("Failed to parse cache index, starting fresh: {}", e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Ok(Self {
            dir,
            index: Mutex::new(index),
            max_size: MAX_CACHE_SIZE,
            max_age: Duration::days(MAX_CACHE_AGE_DAYS),
        })
    }

    #[cfg(test)]
    fn with_limits(mut self, max_size: u64, max_age: Duration) -> Self {
        self.max_size = max_size;
        self.max_age = max_age;
        self
    }

    fn cache_key(key: &ContentKey) -> String {
        key.to_string()
    }

    fn file_path(&self, entry: &CacheEntry) -> PathBuf {
        self.dir.join(&entry.file_name)
    }

    /// Whether a finished file is cached for the key.
    pub async fn is_cached(&self, key: &ContentKey) -> bool {
        self.cached_path(key).await.is_some()
    }

    /// Path of the cached file for the key, updating access tracking.
    ///
    /// A missing file self-heals the index entry away.
    pub async fn cached_path(&self, key: &ContentKey) -> Option<PathBuf> {
        let cache_key = Self::cache_key(key);
        let mut index = self.index.lock().await;

        let entry = index.get_mut(&cache_key)?;
        let path = self.dir.join(&entry.file_name);
        if !path.exists() {
            debug!(key = %key, "Cached file vanished, dropping index entry");
            index.remove(&cache_key);
            let snapshot = index.clone();
            drop(index);
            self.save_index(&snapshot).await;
            return None;
        }

        entry.last_accessed = Utc::now();
        entry.access_count += 1;
        let snapshot = index.clone();
        drop(index);
        self.save_index(&snapshot).await;

        Some(path)
    }

    /// Copy a finished file into the cache, then run cleanup.
    pub async fn add(
        &self,
        key: &ContentKey,
        source_path: impl AsRef<Path>,
        duration_seconds: Option<f64>,
    ) -> StoreResult<PathBuf> {
        let file_name = key.canonical_name();
        let cache_path = self.dir.join(&file_name);

        tokio::fs::copy(source_path.as_ref(), &cache_path).await?;
        let size_bytes = tokio::fs::metadata(&cache_path).await?.len();

        let now = Utc::now();
        let entry = CacheEntry {
            key: key.clone(),
            file_name,
            size_bytes,
            duration_seconds,
            created_at: now,
            last_accessed: now,
            access_count: 1,
        };

        {
            let mut index = self.index.lock().await;
            index.insert(Self::cache_key(key), entry);
        }

        info!(key = %key, size_bytes, "Added file to disk cache");
        self.cleanup().await;

        Ok(cache_path)
    }

    /// Cache usage summary.
    pub async fn stats(&self) -> CacheStats {
        let index = self.index.lock().await;
        CacheStats {
            total_files: index.len(),
            total_size_bytes: index.values().map(|e| e.size_bytes).sum(),
            max_size_bytes: self.max_size,
        }
    }

    /// Evict expired entries, then least-accessed entries while over the cap.
    async fn cleanup(&self) {
        let now = Utc::now();
        let mut index = self.index.lock().await;

        // Age-based eviction
        let expired: Vec<String> = index
            .iter()
            .filter(|(_, e)| now - e.last_accessed > self.max_age)
            .map(|(k, _)| k.clone())
            .collect();
        for cache_key in expired {
            if let Some(entry) = index.remove(&cache_key) {
                let path = self.file_path(&entry);
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(file = %path.display(), "Failed to delete expired cache file: {}", e);
                }
                debug!(key = %entry.key, "Evicted expired cache entry");
            }
        }

        // Size-based eviction, least accessed first, down to the watermark
        let mut total: u64 = index.values().map(|e| e.size_bytes).sum();
        if total > self.max_size {
            let watermark = (self.max_size as f64 * SIZE_WATERMARK) as u64;
            let mut by_access: Vec<(String, u64, u64)> = index
                .iter()
                .map(|(k, e)| (k.clone(), e.access_count, e.size_bytes))
                .collect();
            by_access.sort_by_key(|(_, count, _)| *count);

            for (cache_key, _, size) in by_access {
                if total <= watermark {
                    break;
                }
                if let Some(entry) = index.remove(&cache_key) {
                    let path = self.file_path(&entry);
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        warn!(file = %path.display(), "Failed to delete cache file: {}", e);
                    }
                    total -= size;
                    debug!(key = %entry.key, "Evicted cache entry for size bound");
                }
            }
        }

        let snapshot = index.clone();
        drop(index);
        self.save_index(&snapshot).await;
    }

    /// Persist the index. Best-effort: the cache survives a lost index.
    async fn save_index(&self, index: &HashMap<String, CacheEntry>) {
        let index_path = self.dir.join(INDEX_FILE);
        match serde_json::to_string_pretty(index) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(&index_path, json).await {
                    warn!("Failed to save cache index: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize cache index: {}", e),
        }
    }
}
