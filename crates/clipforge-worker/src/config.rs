//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Storage root holding downloads/references/cache/clips.
    pub storage_root: PathBuf,
    /// Concurrent clip jobs per group in the batch pipeline.
    pub clip_group_size: usize,
    /// Age after which a partial download counts as stuck.
    pub stuck_threshold: Duration,
    /// Interval between sweeper passes.
    pub sweep_interval: Duration,
    /// Downloader backend selector ("auto" or a backend name).
    pub backend: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./storage"),
            clip_group_size: 3,
            stuck_threshold: Duration::from_secs(300), // 5 minutes
            sweep_interval: Duration::from_secs(60),
            backend: "auto".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            storage_root: std::env::var("CLIPFORGE_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_root),
            clip_group_size: std::env::var("CLIPFORGE_CLIP_GROUP_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.clip_group_size),
            stuck_threshold: Duration::from_secs(
                std::env::var("CLIPFORGE_STUCK_THRESHOLD_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            sweep_interval: Duration::from_secs(
                std::env::var("CLIPFORGE_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            backend: std::env::var("CLIPFORGE_BACKEND").unwrap_or(defaults.backend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.clip_group_size, 3);
        assert_eq!(config.stuck_threshold, Duration::from_secs(300));
        assert_eq!(config.backend, "auto");
    }
}
