//! Error types for storage operations.

use std::path::PathBuf;
use thiserror::Error;

use clipforge_models::ProjectId;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the content stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No video resolvable for project {0}")]
    SourceNotFound(ProjectId),

    #[error("Project {0} not found in metadata store")]
    ProjectNotFound(ProjectId),

    #[error("Invalid reference record at {path}: {message}")]
    InvalidReference { path: PathBuf, message: String },

    #[error("Metadata store error: {0}")]
    Metadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata(message.into())
    }

    pub fn invalid_reference(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidReference {
            path: path.into(),
            message: message.into(),
        }
    }
}
