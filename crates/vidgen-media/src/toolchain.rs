//! The media toolchain seam.
//!
//! The orchestrator depends on this trait rather than on ffmpeg directly,
//! so pipeline tests can run against an in-memory fake.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::audio::adjust_audio;
use crate::error::MediaResult;
use crate::frames::{extract_frame_at, extract_last_frame, generate_thumbnail};
use crate::merge::{merge_av, transcode};
use crate::probe::{probe_media, probe_streams, probe_video, MediaInfo, MergedStreams, VideoInfo};
use crate::stitch::{concat_simple, stitch_crossfade};

/// Every media operation the pipeline needs.
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    /// Stream-level probe of a video file.
    async fn probe(&self, video: &Path) -> MediaResult<VideoInfo>;

    /// Container-level probe of any media file.
    async fn probe_media(&self, path: &Path) -> MediaResult<MediaInfo>;

    /// Stream presence and codecs of a merged output.
    async fn verify_merged(&self, path: &Path) -> MediaResult<MergedStreams>;

    /// Grab the final frame (0.1s before EOF) at high quality.
    async fn extract_last_frame(&self, video: &Path, image_out: &Path) -> MediaResult<PathBuf>;

    /// Grab one frame at `ts` seconds.
    async fn extract_frame_at(&self, video: &Path, ts: f64, image_out: &Path)
        -> MediaResult<PathBuf>;

    /// 1280x720 thumbnail sampled at t=2s.
    async fn generate_thumbnail(&self, video: &Path, image_out: &Path) -> MediaResult<PathBuf>;

    /// Lossless concat via list file and `-c copy`.
    async fn concat_simple(&self, segments: &[PathBuf], out: &Path) -> MediaResult<PathBuf>;

    /// Crossfade stitch into the 720p master.
    async fn stitch_crossfade(
        &self,
        segments: &[PathBuf],
        out: &Path,
        fade_duration: f64,
    ) -> MediaResult<PathBuf>;

    /// Merge video + narration (video copied, audio AAC 192k).
    async fn merge_av(
        &self,
        video: &Path,
        audio: &Path,
        out: &Path,
        trim_to_shortest: bool,
    ) -> MediaResult<PathBuf>;

    /// Scale transcode, H.264 medium/23, audio copied.
    async fn transcode(
        &self,
        input: &Path,
        out: &Path,
        width: u32,
        height: u32,
    ) -> MediaResult<PathBuf>;

    /// Fit narration to the video duration (copy / pad / tempo).
    async fn adjust_audio(
        &self,
        audio: &Path,
        target_duration: f64,
        out: &Path,
    ) -> MediaResult<PathBuf>;
}

/// The real toolchain, shelling out to ffmpeg/ffprobe.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolchain;

impl FfmpegToolchain {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaToolchain for FfmpegToolchain {
    async fn probe(&self, video: &Path) -> MediaResult<VideoInfo> {
        probe_video(video).await
    }

    async fn probe_media(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(path).await
    }

    async fn verify_merged(&self, path: &Path) -> MediaResult<MergedStreams> {
        probe_streams(path).await
    }

    async fn extract_last_frame(&self, video: &Path, image_out: &Path) -> MediaResult<PathBuf> {
        extract_last_frame(video, image_out).await
    }

    async fn extract_frame_at(
        &self,
        video: &Path,
        ts: f64,
        image_out: &Path,
    ) -> MediaResult<PathBuf> {
        extract_frame_at(video, ts, image_out).await
    }

    async fn generate_thumbnail(&self, video: &Path, image_out: &Path) -> MediaResult<PathBuf> {
        generate_thumbnail(video, image_out).await
    }

    async fn concat_simple(&self, segments: &[PathBuf], out: &Path) -> MediaResult<PathBuf> {
        concat_simple(segments, out).await
    }

    async fn stitch_crossfade(
        &self,
        segments: &[PathBuf],
        out: &Path,
        fade_duration: f64,
    ) -> MediaResult<PathBuf> {
        stitch_crossfade(segments, out, fade_duration).await
    }

    async fn merge_av(
        &self,
        video: &Path,
        audio: &Path,
        out: &Path,
        trim_to_shortest: bool,
    ) -> MediaResult<PathBuf> {
        merge_av(video, audio, out, trim_to_shortest).await
    }

    async fn transcode(
        &self,
        input: &Path,
        out: &Path,
        width: u32,
        height: u32,
    ) -> MediaResult<PathBuf> {
        transcode(input, out, width, height).await
    }

    async fn adjust_audio(
        &self,
        audio: &Path,
        target_duration: f64,
        out: &Path,
    ) -> MediaResult<PathBuf> {
        adjust_audio(audio, target_duration, out).await
    }
}
