//! Clip transcoding operations.
//!
//! One entry point, [`create_clip`], cuts a time range out of a source file
//! and formats it for the requested aspect ratio. The crop/scale choice comes
//! from the fixed policy table in [`crate::filters`]; the cut uses input
//! seeking with `duration = end - start`.

use std::path::Path;

use tracing::{info, warn};

use clipforge_models::ClipRequest;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{filter_for_aspect, filter_thumbnail};
use crate::progress::FfmpegProgress;

/// Default thumbnail width in pixels.
const THUMBNAIL_WIDTH: u32 = 640;

/// Cut and format a single clip out of a source video.
///
/// The request must already be validated (`end_time > start_time`); callers
/// that skip validation get the tool's error surfaced instead.
pub async fn create_clip<F>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    request: &ClipRequest,
    progress_callback: F,
) -> MediaResult<()>
where
    F: Fn(FfmpegProgress) + Send + 'static,
{
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }

    info!(
        input = %input.display(),
        output = %output.display(),
        start = request.start_time,
        duration = request.duration(),
        aspect = %request.aspect_ratio,
        "Creating clip"
    );

    let cmd = FfmpegCommand::new(input, output)
        .seek(request.start_time)
        .duration(request.duration())
        .video_filter(filter_for_aspect(request.aspect_ratio))
        .video_codec("libx264")
        .audio_codec("aac");

    FfmpegRunner::new()
        .run_with_progress(&cmd, progress_callback)
        .await?;

    // Thumbnail is best-effort; a clip without one is still a clip
    let thumb_path = output.with_extension("jpg");
    if let Err(e) = generate_thumbnail(output, &thumb_path).await {
        warn!(clip = %output.display(), "Failed to generate thumbnail: {}", e);
    }

    Ok(())
}

/// Extract a single scaled frame as a thumbnail.
pub async fn generate_thumbnail(
    video: impl AsRef<Path>,
    thumbnail: impl AsRef<Path>,
) -> MediaResult<()> {
    let video = video.as_ref();
    let thumbnail = thumbnail.as_ref();

    let cmd = FfmpegCommand::new(video, thumbnail)
        .seek(1.0)
        .video_filter(filter_thumbnail(THUMBNAIL_WIDTH))
        .single_frame();

    FfmpegRunner::new().run(&cmd).await
}
