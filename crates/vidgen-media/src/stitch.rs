//! Segment concatenation and crossfade stitching.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use vidgen_models::encoding::{H264_CRF, H264_PRESET, STITCH_HEIGHT, STITCH_WIDTH};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Concatenate segments losslessly via a concat-list file and `-c copy`.
pub async fn concat_simple(segments: &[PathBuf], out: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let out = out.as_ref();
    if segments.is_empty() {
        return Err(MediaError::NoSegments);
    }

    let list_path = out.with_extension("concat.txt");
    let mut list = String::new();
    for segment in segments {
        // concat demuxer single-quote escaping
        let escaped = segment.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{}'\n", escaped));
    }
    fs::write(&list_path, list).await?;

    let cmd = FfmpegCommand::new(out)
        .input_with_args(["-f", "concat", "-safe", "0"], &list_path)
        .output_args(["-c", "copy"]);

    let result = FfmpegRunner::new().run(&cmd).await;
    let _ = fs::remove_file(&list_path).await;
    result?;

    info!(count = segments.len(), out = %out.display(), "Concatenated segments");
    Ok(out.to_path_buf())
}

/// Stitch segments with crossfade transitions into a 720p master.
///
/// Offsets are computed from the probed duration of each actual file, so a
/// short last segment or provider duration variance cannot desync the
/// filter graph. A single segment is re-encoded without any fade.
pub async fn stitch_crossfade(
    segments: &[PathBuf],
    out: impl AsRef<Path>,
    fade_duration: f64,
) -> MediaResult<PathBuf> {
    let out = out.as_ref();
    match segments {
        [] => Err(MediaError::NoSegments),
        [single] => reencode_single(single, out).await,
        many => {
            let mut durations = Vec::with_capacity(many.len());
            for segment in many {
                durations.push(probe_video(segment).await?.duration);
            }

            let filter = crossfade_filter(&durations, fade_duration);
            debug!(filter = %filter, "Built crossfade filter graph");

            let mut cmd = FfmpegCommand::new(out);
            for segment in many {
                cmd = cmd.input(segment);
            }
            let cmd = cmd
                .filter_complex(filter)
                .map(format!("[x{}]", many.len() - 1))
                .video_codec("libx264")
                .preset(H264_PRESET)
                .crf(H264_CRF)
                .output_args(["-pix_fmt", "yuv420p", "-an", "-movflags", "+faststart"]);

            FfmpegRunner::new().run(&cmd).await?;
            info!(count = many.len(), out = %out.display(), "Stitched segments with crossfade");
            Ok(out.to_path_buf())
        }
    }
}

async fn reencode_single(segment: &Path, out: &Path) -> MediaResult<PathBuf> {
    let cmd = FfmpegCommand::new(out)
        .input(segment)
        .video_filter(format!("scale={STITCH_WIDTH}:{STITCH_HEIGHT},setsar=1"))
        .video_codec("libx264")
        .preset(H264_PRESET)
        .crf(H264_CRF)
        .output_args(["-pix_fmt", "yuv420p", "-an", "-movflags", "+faststart"]);

    FfmpegRunner::new().run(&cmd).await?;
    Ok(out.to_path_buf())
}

/// Build the scale + xfade chain.
///
/// Each input is normalized to the stitch resolution, then chained:
/// `[v0][v1]xfade=...[x1]`, `[x1][v2]xfade=...[x2]`, ... The offset of the
/// k-th fade is the summed measured duration of inputs 0..=k minus the
/// fades already consumed: `sum(dur) - (k+1) * fade`.
fn crossfade_filter(durations: &[f64], fade: f64) -> String {
    let n = durations.len();
    let mut parts = Vec::new();

    for i in 0..n {
        parts.push(format!(
            "[{i}:v]scale={STITCH_WIDTH}:{STITCH_HEIGHT},setsar=1[v{i}]"
        ));
    }

    let mut running = durations[0];
    for k in 0..n - 1 {
        let prev = if k == 0 {
            "[v0]".to_string()
        } else {
            format!("[x{k}]")
        };
        // running totals the source durations up to and including input k
        let offset = running - fade * (k as f64 + 1.0);
        parts.push(format!(
            "{prev}[v{next}]xfade=transition=fade:duration={fade:.3}:offset={offset:.3}[x{next}]",
            next = k + 1,
        ));
        running += durations[k + 1];
    }

    parts.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossfade_offsets_use_measured_durations() {
        // 12s, 12s, 8s segments with 0.5s fades
        let filter = crossfade_filter(&[12.0, 12.0, 8.0], 0.5);

        // first fade starts at 12 - 0.5 = 11.5
        assert!(filter.contains("offset=11.500"), "{filter}");
        // second at 12 + 12 - 2*0.5 = 23.0
        assert!(filter.contains("offset=23.000"), "{filter}");
        assert!(filter.contains("[x2]"));
        assert!(filter.contains("scale=1280:720"));
    }

    #[test]
    fn test_crossfade_filter_two_inputs() {
        let filter = crossfade_filter(&[5.0, 5.0], 0.5);
        assert!(filter.contains("[v0]"));
        assert!(filter.contains("[v1]xfade=transition=fade:duration=0.500:offset=4.500[x1]"));
    }
}
