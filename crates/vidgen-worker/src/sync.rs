//! Audio/video synchronization checks.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use vidgen_media::{MediaToolchain, MergedStreams};

use crate::error::WorkerResult;

/// Default acceptable drift between audio and video, seconds.
pub const DEFAULT_SYNC_TOLERANCE_SECS: f64 = 2.0;

/// What to do about a duration mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRecommendation {
    /// Within tolerance, leave alone
    None,
    /// Audio runs long: trim or speed up
    TrimOrTempoUp,
    /// Audio runs short: pad with silence
    PadWithSilence,
}

/// Result of comparing audio and video durations.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub in_sync: bool,
    pub video_duration: f64,
    pub audio_duration: f64,
    /// audio minus video, seconds
    pub diff: f64,
    pub recommendation: SyncRecommendation,
}

/// Result of validating a finished output.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Duration comparison and adjustment over the media toolchain.
#[derive(Clone)]
pub struct SyncVerifier {
    toolchain: Arc<dyn MediaToolchain>,
}

impl SyncVerifier {
    pub fn new(toolchain: Arc<dyn MediaToolchain>) -> Self {
        Self { toolchain }
    }

    /// Compare probed durations.
    pub async fn verify(
        &self,
        video_path: &Path,
        audio_path: &Path,
        tolerance: f64,
    ) -> WorkerResult<SyncReport> {
        let video_duration = self.toolchain.probe_media(video_path).await?.duration;
        let audio_duration = self.toolchain.probe_media(audio_path).await?.duration;
        let diff = audio_duration - video_duration;

        let in_sync = diff.abs() <= tolerance;
        let recommendation = if in_sync {
            SyncRecommendation::None
        } else if diff > 0.0 {
            SyncRecommendation::TrimOrTempoUp
        } else {
            SyncRecommendation::PadWithSilence
        };

        debug!(video_duration, audio_duration, diff, "Verified A/V sync");
        Ok(SyncReport {
            in_sync,
            video_duration,
            audio_duration,
            diff,
            recommendation,
        })
    }

    /// Fit the narration to `target_duration` (copy / pad / tempo, decided
    /// by the toolchain).
    pub async fn adjust_audio(
        &self,
        audio_path: &Path,
        target_duration: f64,
        out: &Path,
    ) -> WorkerResult<()> {
        self.toolchain
            .adjust_audio(audio_path, target_duration, out)
            .await?;
        info!(target_duration, "Adjusted narration to video length");
        Ok(())
    }

    /// Stream presence and codecs of a merged output.
    pub async fn verify_merged(&self, path: &Path) -> WorkerResult<MergedStreams> {
        Ok(self.toolchain.verify_merged(path).await?)
    }

    /// Sanity-check a finished output. Small resolutions and very short
    /// durations are warnings; a missing video stream is an error.
    pub async fn validate(&self, path: &Path) -> WorkerResult<ValidationReport> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let info = self.toolchain.probe(path).await?;
        if info.duration <= 0.0 {
            errors.push("zero-length video".to_string());
        }
        if info.width < 480 || info.height < 270 {
            warnings.push(format!("low resolution: {}x{}", info.width, info.height));
        }
        if info.duration < 10.0 && info.duration > 0.0 {
            warnings.push(format!("short duration: {:.1}s", info.duration));
        }

        Ok(ValidationReport {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use vidgen_media::{MediaError, MediaInfo, MediaResult, VideoInfo};

    /// Probe-only fake: durations keyed by file name.
    struct FakeProbe {
        video_secs: f64,
        audio_secs: f64,
    }

    #[async_trait]
    impl MediaToolchain for FakeProbe {
        async fn probe(&self, _video: &Path) -> MediaResult<VideoInfo> {
            Ok(VideoInfo {
                duration: self.video_secs,
                width: 1280,
                height: 720,
                fps: 30.0,
                codec: "h264".to_string(),
                size: 1,
            })
        }

        async fn probe_media(&self, path: &Path) -> MediaResult<MediaInfo> {
            let is_audio = path.extension().map(|e| e == "mp3").unwrap_or(false);
            Ok(MediaInfo {
                duration: if is_audio { self.audio_secs } else { self.video_secs },
                format: if is_audio { "mp3" } else { "mp4" }.to_string(),
                bitrate: None,
                channels: None,
                sample_rate: None,
            })
        }

        async fn verify_merged(&self, _path: &Path) -> MediaResult<MergedStreams> {
            Ok(MergedStreams {
                has_video: true,
                has_audio: true,
                video_codec: Some("h264".to_string()),
                audio_codec: Some("aac".to_string()),
                duration: self.video_secs,
            })
        }

        async fn extract_last_frame(&self, _v: &Path, out: &Path) -> MediaResult<PathBuf> {
            Ok(out.to_path_buf())
        }

        async fn extract_frame_at(&self, _v: &Path, _ts: f64, out: &Path) -> MediaResult<PathBuf> {
            Ok(out.to_path_buf())
        }

        async fn generate_thumbnail(&self, _v: &Path, out: &Path) -> MediaResult<PathBuf> {
            Ok(out.to_path_buf())
        }

        async fn concat_simple(&self, _s: &[PathBuf], out: &Path) -> MediaResult<PathBuf> {
            Ok(out.to_path_buf())
        }

        async fn stitch_crossfade(
            &self,
            _s: &[PathBuf],
            out: &Path,
            _fade: f64,
        ) -> MediaResult<PathBuf> {
            Ok(out.to_path_buf())
        }

        async fn merge_av(
            &self,
            _v: &Path,
            _a: &Path,
            out: &Path,
            _trim: bool,
        ) -> MediaResult<PathBuf> {
            Ok(out.to_path_buf())
        }

        async fn transcode(&self, _i: &Path, out: &Path, _w: u32, _h: u32) -> MediaResult<PathBuf> {
            Ok(out.to_path_buf())
        }

        async fn adjust_audio(&self, _a: &Path, _t: f64, out: &Path) -> MediaResult<PathBuf> {
            if self.audio_secs <= 0.0 {
                return Err(MediaError::InvalidVideo("no audio".into()));
            }
            Ok(out.to_path_buf())
        }
    }

    #[tokio::test]
    async fn test_long_audio_recommends_tempo_up() {
        let verifier = SyncVerifier::new(Arc::new(FakeProbe {
            video_secs: 60.0,
            audio_secs: 63.0,
        }));

        let report = verifier
            .verify(Path::new("video.mp4"), Path::new("audio.mp3"), DEFAULT_SYNC_TOLERANCE_SECS)
            .await
            .unwrap();

        assert!(!report.in_sync);
        assert_eq!(report.diff, 3.0);
        assert_eq!(report.recommendation, SyncRecommendation::TrimOrTempoUp);
    }

    #[tokio::test]
    async fn test_short_audio_recommends_padding() {
        let verifier = SyncVerifier::new(Arc::new(FakeProbe {
            video_secs: 60.0,
            audio_secs: 55.0,
        }));

        let report = verifier
            .verify(Path::new("video.mp4"), Path::new("audio.mp3"), DEFAULT_SYNC_TOLERANCE_SECS)
            .await
            .unwrap();

        assert_eq!(report.recommendation, SyncRecommendation::PadWithSilence);
    }

    #[tokio::test]
    async fn test_within_tolerance_is_in_sync() {
        let verifier = SyncVerifier::new(Arc::new(FakeProbe {
            video_secs: 60.0,
            audio_secs: 61.0,
        }));

        let report = verifier
            .verify(Path::new("video.mp4"), Path::new("audio.mp3"), DEFAULT_SYNC_TOLERANCE_SECS)
            .await
            .unwrap();

        assert!(report.in_sync);
        assert_eq!(report.recommendation, SyncRecommendation::None);
    }

    #[tokio::test]
    async fn test_validate_flags_short_video_as_warning() {
        let verifier = SyncVerifier::new(Arc::new(FakeProbe {
            video_secs: 5.0,
            audio_secs: 5.0,
        }));

        let report = verifier.validate(Path::new("final.mp4")).await.unwrap();
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("short duration"));
    }
}
