//! Frame extraction and thumbnails.

use std::path::{Path, PathBuf};

use vidgen_models::encoding::{
    LAST_FRAME_REWIND_SECS, THUMBNAIL_HEIGHT, THUMBNAIL_TIMESTAMP_SECS, THUMBNAIL_WIDTH,
};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_video;

/// Extract the final frame of a video at high quality.
///
/// Seeks to 0.1s before EOF so the frame comes from the last GOP rather
/// than an empty read past the end.
pub async fn extract_last_frame(
    video: impl AsRef<Path>,
    image_out: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let video = video.as_ref();
    let image_out = image_out.as_ref();

    let info = probe_video(video).await?;
    let seek = (info.duration - LAST_FRAME_REWIND_SECS).max(0.0);

    extract_frame_at(video, seek, image_out).await
}

/// Extract one frame at `ts` seconds.
pub async fn extract_frame_at(
    video: impl AsRef<Path>,
    ts: f64,
    image_out: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let image_out = image_out.as_ref();

    let cmd = FfmpegCommand::new(image_out)
        .input_seeked(ts, video.as_ref())
        .single_frame()
        .output_args(["-q:v", "2"]);

    FfmpegRunner::new().run(&cmd).await?;
    Ok(image_out.to_path_buf())
}

/// Generate a 1280x720 thumbnail, sampled at t=2s.
pub async fn generate_thumbnail(
    video: impl AsRef<Path>,
    image_out: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let image_out = image_out.as_ref();

    let filter = format!("scale={THUMBNAIL_WIDTH}:{THUMBNAIL_HEIGHT}");
    let cmd = FfmpegCommand::new(image_out)
        .input_seeked(THUMBNAIL_TIMESTAMP_SECS, video.as_ref())
        .single_frame()
        .video_filter(filter)
        .output_args(["-q:v", "2"]);

    FfmpegRunner::new().run(&cmd).await?;
    Ok(image_out.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_scale_filter() {
        let filter = format!("scale={THUMBNAIL_WIDTH}:{THUMBNAIL_HEIGHT}");
        assert_eq!(filter, "scale=1280:720");
    }
}
