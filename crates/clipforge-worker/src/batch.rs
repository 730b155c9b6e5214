//! Batch clip pipeline.
//!
//! Turns an ordered list of time-range requests into output clips with
//! bounded concurrency: jobs run in fixed-size groups, every job in a group
//! launched together and the whole group settled before the next begins.
//! A failing job never cancels its siblings or later groups; every request
//! yields exactly one outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use clipforge_media::{create_clip, MediaResult};
use clipforge_models::{BatchResult, ClipOutcome, ClipRequest, ContentKey, ProjectId};
use clipforge_store::DiskCache;

use crate::error::{WorkerError, WorkerResult};

/// Transcoding seam: the pipeline drives this, tests fake it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipTranscoder: Send + Sync {
    async fn transcode(
        &self,
        source: &Path,
        output: &Path,
        request: &ClipRequest,
    ) -> MediaResult<()>;
}

/// Real transcoder backed by the FFmpeg command layer.
pub struct FfmpegTranscoder;

#[async_trait]
impl ClipTranscoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        source: &Path,
        output: &Path,
        request: &ClipRequest,
    ) -> MediaResult<()> {
        create_clip(source, output, request, |_| {}).await
    }
}

/// Bounded-concurrency batch transcoder.
pub struct BatchClipPipeline {
    clips_dir: PathBuf,
    group_size: usize,
    transcoder: Arc<dyn ClipTranscoder>,
}

impl BatchClipPipeline {
    pub fn new(clips_dir: impl AsRef<Path>, group_size: usize) -> Self {
        Self::with_transcoder(clips_dir, group_size, Arc::new(FfmpegTranscoder))
    }

    pub fn with_transcoder(
        clips_dir: impl AsRef<Path>,
        group_size: usize,
        transcoder: Arc<dyn ClipTranscoder>,
    ) -> Self {
        Self {
            clips_dir: clips_dir.as_ref().to_path_buf(),
            group_size: group_size.max(1),
            transcoder,
        }
    }

    /// Run the whole batch against a source file.
    ///
    /// The batch is rejected outright when the source is missing; individual
    /// job failures (bad time range, tool error) are recorded per clip.
    pub async fn run(
        &self,
        project_id: ProjectId,
        source: &Path,
        requests: &[ClipRequest],
    ) -> WorkerResult<BatchResult> {
        if !source.exists() {
            return Err(WorkerError::validation(format!(
                "Source video not found: {}",
                source.display()
            )));
        }

        tokio::fs::create_dir_all(&self.clips_dir).await?;

        info!(
            project_id = %project_id,
            clips = requests.len(),
            group_size = self.group_size,
            "Starting batch clip processing"
        );

        let mut outcomes = Vec::with_capacity(requests.len());

        for group in requests.chunks(self.group_size) {
            let jobs = group
                .iter()
                .map(|request| self.process_single(project_id, source, request));
            // The whole group settles before the next one starts; that is
            // the concurrency bound
            outcomes.extend(join_all(jobs).await);
        }

        let result = BatchResult::from_outcomes(outcomes);
        info!(
            project_id = %project_id,
            completed = result.clips.len() - result.failed_count(),
            failed = result.failed_count(),
            "Batch clip processing finished"
        );

        Ok(result)
    }

    /// Process one clip job. Never fails the batch: every path produces an
    /// outcome.
    async fn process_single(
        &self,
        project_id: ProjectId,
        source: &Path,
        request: &ClipRequest,
    ) -> ClipOutcome {
        let clip_id = format!("clip_{}_{}", project_id, Uuid::new_v4().simple());

        if let Err(message) = request.validate() {
            warn!(clip_id = %clip_id, title = %request.title, "Rejected clip request: {}", message);
            return ClipOutcome::failed(clip_id, &request.title, message);
        }

        let output = self.clips_dir.join(format!("{}.mp4", clip_id));

        match self
            .transcoder
            .transcode(source, &output, request)
            .await
        {
            Ok(()) => ClipOutcome::completed(clip_id, &request.title, output.to_string_lossy()),
            Err(e) => {
                warn!(clip_id = %clip_id, title = %request.title, "Clip transcode failed: {}", e);
                ClipOutcome::failed(clip_id, &request.title, e.to_string())
            }
        }
    }
}

/// Prefer a scratch copy from the disk cache over the canonical file.
///
/// Populates the cache on first use so repeated batches against the same
/// source hit the scratch copy. Falls back to the canonical path whenever
/// the cache misbehaves.
pub async fn scratch_source(cache: &DiskCache, key: &ContentKey, canonical: &Path) -> PathBuf {
    if let Some(cached) = cache.cached_path(key).await {
        return cached;
    }

    match cache.add(key, canonical, None).await {
        Ok(cached) => cached,
        Err(e) => {
            warn!(key = %key, "Disk cache population failed, using canonical: {}", e);
            canonical.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_media::MediaError;
    use clipforge_models::{AspectRatio, ClipStatus, Quality, SourceId};

    fn request(title: &str, start: f64, end: f64) -> ClipRequest {
        ClipRequest {
            start_time: start,
            end_time: end,
            title: title.to_string(),
            aspect_ratio: AspectRatio::Portrait,
        }
    }

    fn source_file(dir: &Path) -> PathBuf {
        let path = dir.join("source.mp4");
        std::fs::write(&path, b"source bytes").unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_source_rejects_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = BatchClipPipeline::with_transcoder(
            dir.path().join("clips"),
            3,
            Arc::new(MockClipTranscoder::new()),
        );

        let err = pipeline
            .run(
                ProjectId(1),
                &dir.path().join("missing.mp4"),
                &[request("A", 0.0, 5.0)],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_invalid_jobs_fail_without_touching_the_tool() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());

        let mut mock = MockClipTranscoder::new();
        // Only the two valid requests reach the transcoder
        mock.expect_transcode().times(2).returning(|_, _, _| Ok(()));

        let pipeline =
            BatchClipPipeline::with_transcoder(dir.path().join("clips"), 3, Arc::new(mock));

        let requests = vec![
            request("Valid 1", 0.0, 5.0),
            request("Zero duration", 5.0, 5.0),
            request("Valid 2", 10.0, 20.0),
            request("Backwards", 9.0, 3.0),
        ];

        let result = pipeline
            .run(ProjectId(1), &source, &requests)
            .await
            .unwrap();

        assert_eq!(result.clips.len(), 4);
        assert_eq!(result.failed_count(), 2);
        assert!(!result.success);

        // Outcomes keep input order and per-job errors
        assert_eq!(result.clips[0].status, ClipStatus::Completed);
        assert_eq!(result.clips[1].status, ClipStatus::Failed);
        assert!(result.clips[1].error.as_ref().unwrap().contains("greater"));
        assert_eq!(result.clips[2].status, ClipStatus::Completed);
        assert_eq!(result.clips[3].status, ClipStatus::Failed);
    }

    #[tokio::test]
    async fn test_tool_failure_does_not_cancel_siblings_or_later_groups() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());

        let mut mock = MockClipTranscoder::new();
        mock.expect_transcode()
            .times(5)
            .returning(|_, _, request: &ClipRequest| {
                if request.title == "Broken" {
                    Err(MediaError::ffmpeg_failed("encoder exploded", None, Some(1)))
                } else {
                    Ok(())
                }
            });

        // Group size 2 -> groups [A, Broken], [C, D], [E]
        let pipeline =
            BatchClipPipeline::with_transcoder(dir.path().join("clips"), 2, Arc::new(mock));

        let requests = vec![
            request("A", 0.0, 5.0),
            request("Broken", 5.0, 10.0),
            request("C", 10.0, 15.0),
            request("D", 15.0, 20.0),
            request("E", 20.0, 25.0),
        ];

        let result = pipeline
            .run(ProjectId(1), &source, &requests)
            .await
            .unwrap();

        assert_eq!(result.clips.len(), 5);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.clips[1].status, ClipStatus::Failed);
        assert!(result.clips[1].error.as_ref().unwrap().contains("encoder"));
        for idx in [0, 2, 3, 4] {
            assert_eq!(result.clips[idx].status, ClipStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_every_outcome_gets_a_distinct_id() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());

        let mut mock = MockClipTranscoder::new();
        mock.expect_transcode().returning(|_, _, _| Ok(()));

        let pipeline =
            BatchClipPipeline::with_transcoder(dir.path().join("clips"), 3, Arc::new(mock));

        let requests = vec![
            request("A", 0.0, 5.0),
            request("B", 0.0, 5.0),
            request("C", 0.0, 5.0),
        ];
        let result = pipeline
            .run(ProjectId(7), &source, &requests)
            .await
            .unwrap();

        let mut ids: Vec<_> = result.clips.iter().map(|c| c.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        assert!(result.clips.iter().all(|c| c.id.starts_with("clip_7_")));
    }

    #[tokio::test]
    async fn test_scratch_source_populates_and_reuses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let canonical = source_file(dir.path());
        let cache = DiskCache::open(dir.path().join("cache")).await.unwrap();
        let key = ContentKey::new(SourceId::from("abc123def45"), Quality::P720, true);

        let first = scratch_source(&cache, &key, &canonical).await;
        assert_ne!(first, canonical);
        assert!(first.exists());

        let second = scratch_source(&cache, &key, &canonical).await;
        assert_eq!(first, second);
    }
}
