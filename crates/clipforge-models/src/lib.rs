//! Shared data models for the ClipForge backend.
//!
//! This crate provides Serde-serializable types for:
//! - Source identifiers and content keys
//! - Download progress and status reporting
//! - Clip requests and batch results
//! - Project metadata records

pub mod clip;
pub mod content;
pub mod progress;
pub mod project;
pub mod quality;
pub mod source;

// Re-export common types
pub use clip::{AspectRatio, BatchResult, ClipOutcome, ClipRequest, ClipStatus};
pub use content::{CanonicalFile, ContentKey, VideoSource, PARTIAL_SUFFIX};
pub use progress::{DownloadPhase, DownloadProgress, DownloadStatusReport};
pub use project::{ProjectId, ProjectRecord, ProjectStatus, ProjectUpdate, VideoDetails};
pub use quality::{Quality, QualityParseError};
pub use source::SourceId;
