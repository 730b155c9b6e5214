//! Worker error types.

use thiserror::Error;

use clipforge_models::ProjectId;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Every backend in the chain failed; message aggregates all attempts.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Project {0} not found")]
    ProjectNotFound(ProjectId),

    #[error("Storage error: {0}")]
    Store(#[from] clipforge_store::StoreError),

    #[error("Media error: {0}")]
    Media(#[from] clipforge_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
