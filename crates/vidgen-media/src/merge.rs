//! Audio/video merge and transcoding.

use std::path::{Path, PathBuf};

use tracing::info;

use vidgen_models::encoding::{AUDIO_BITRATE, AUDIO_CODEC, H264_CRF, H264_PRESET};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Merge a video stream with a narration track: video copied untouched,
/// audio encoded to AAC 192 kbps.
pub async fn merge_av(
    video: impl AsRef<Path>,
    audio: impl AsRef<Path>,
    out: impl AsRef<Path>,
    trim_to_shortest: bool,
) -> MediaResult<PathBuf> {
    let out = out.as_ref();

    let mut cmd = FfmpegCommand::new(out)
        .input(video.as_ref())
        .input(audio.as_ref())
        .map("0:v:0")
        .map("1:a:0")
        .video_codec("copy")
        .audio_codec(AUDIO_CODEC)
        .audio_bitrate(AUDIO_BITRATE)
        .output_args(["-movflags", "+faststart"]);

    if trim_to_shortest {
        cmd = cmd.shortest();
    }

    FfmpegRunner::new().run(&cmd).await?;
    info!(out = %out.display(), "Merged audio and video");
    Ok(out.to_path_buf())
}

/// Transcode to the given resolution, H.264 preset medium / CRF 23, audio
/// stream copied.
pub async fn transcode(
    input: impl AsRef<Path>,
    out: impl AsRef<Path>,
    width: u32,
    height: u32,
) -> MediaResult<PathBuf> {
    let out = out.as_ref();

    let cmd = FfmpegCommand::new(out)
        .input(input.as_ref())
        .video_filter(format!("scale={width}:{height}"))
        .video_codec("libx264")
        .preset(H264_PRESET)
        .crf(H264_CRF)
        .audio_codec("copy")
        .output_args(["-pix_fmt", "yuv420p", "-movflags", "+faststart"]);

    FfmpegRunner::new().run(&cmd).await?;
    info!(out = %out.display(), width, height, "Transcoded video");
    Ok(out.to_path_buf())
}
