//! Narration length adjustment.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use vidgen_models::encoding::AUDIO_BITRATE;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_media;

/// Close enough: below this difference the audio is copied untouched.
const COPY_TOLERANCE_SECS: f64 = 0.5;

/// A single atempo stage only covers 0.5x..2.0x cleanly; larger factors are
/// split into a chain.
const ATEMPO_STAGE_MAX: f64 = 2.0;
const ATEMPO_STAGE_MIN: f64 = 0.5;

/// Fit a narration track to the video duration.
///
/// Within half a second the file is byte-copied; shorter audio is padded
/// with silence to the target; longer audio is tempo-scaled by
/// `audio / target`.
pub async fn adjust_audio(
    audio: impl AsRef<Path>,
    target_duration: f64,
    out: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let audio = audio.as_ref();
    let out = out.as_ref();

    let info = probe_media(audio).await?;
    let diff = info.duration - target_duration;
    debug!(
        audio_duration = info.duration,
        target_duration, diff, "Adjusting narration length"
    );

    if diff.abs() <= COPY_TOLERANCE_SECS {
        fs::copy(audio, out).await?;
        return Ok(out.to_path_buf());
    }

    let filter = if diff < 0.0 {
        format!("apad=whole_dur={target_duration:.3}")
    } else {
        atempo_chain(info.duration / target_duration)
    };

    let cmd = FfmpegCommand::new(out)
        .input(audio)
        .output_arg("-af")
        .output_arg(filter.as_str())
        .audio_codec("libmp3lame")
        .audio_bitrate(AUDIO_BITRATE);

    FfmpegRunner::new().run(&cmd).await?;
    info!(out = %out.display(), filter = %filter, "Adjusted narration length");
    Ok(out.to_path_buf())
}

/// Build an atempo filter for an arbitrary speed factor.
fn atempo_chain(mut factor: f64) -> String {
    let mut stages = Vec::new();
    while factor > ATEMPO_STAGE_MAX {
        stages.push(ATEMPO_STAGE_MAX);
        factor /= ATEMPO_STAGE_MAX;
    }
    while factor < ATEMPO_STAGE_MIN {
        stages.push(ATEMPO_STAGE_MIN);
        factor /= ATEMPO_STAGE_MIN;
    }
    stages.push(factor);

    stages
        .iter()
        .map(|s| format!("atempo={s:.4}"))
        .collect::<Vec<_>>()
        .join(",")
}
