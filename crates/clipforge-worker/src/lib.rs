//! Video acquisition worker.
//!
//! This crate provides:
//! - The download orchestrator state machine (cache check, backend fallback
//!   chain, reference creation, completion verification)
//! - In-memory progress tracking for status pollers
//! - The stuck-download sweeper (cleanup + restart of abandoned downloads)
//! - The bounded-concurrency batch clip pipeline

pub mod batch;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod status;
pub mod sweeper;

pub use batch::{BatchClipPipeline, ClipTranscoder, FfmpegTranscoder};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use orchestrator::{DownloadOrchestrator, DownloadOutcome, DownloadRequest};
pub use progress::ProgressTracker;
pub use status::download_status;
pub use sweeper::{StuckSweeper, SweepReport};
