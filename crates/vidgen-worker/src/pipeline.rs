//! The processing orchestrator.
//!
//! Drives a video through decomposing, generating, stitching, audio,
//! merging and transcoding while holding the exclusive processing lock.
//! Every phase transition and segment status change is persisted before the
//! next external call, so a crash always leaves a resumable (or cleanly
//! failable) record behind.

use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tracing::{error, info, warn};

use vidgen_models::encoding::{CROSSFADE_SECS, FINAL_480_HEIGHT, FINAL_480_WIDTH};
use vidgen_models::{
    fallback_scenes, scenes_are_contiguous, LockMetadata, ProcessingPhase, VideoId, VideoRecord,
};
use vidgen_media::MediaToolchain;
use vidgen_providers::{Enhancement, NarrationProvider, StoryboardProvider, VoiceSettings};
use vidgen_store::locks::PROCESSING_LOCK_KEY;

use crate::cancel::CancelFlag;
use crate::error::{WorkerError, WorkerResult};
use crate::generate::GenerationMode;
use crate::logging::RunLogger;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::services::Services;

/// Progress floor of each phase.
const PROGRESS_DECOMPOSED: u8 = 5;
const PROGRESS_STITCH_FLOOR: u8 = 70;
const PROGRESS_STITCHED: u8 = 80;
const PROGRESS_AUDIO_DONE: u8 = 90;
const PROGRESS_MERGED: u8 = 95;

/// Drift beyond which narration is adjusted before merging, seconds.
const AUDIO_ADJUST_THRESHOLD_SECS: f64 = 0.5;

/// The six-phase state machine.
#[derive(Clone)]
pub struct Orchestrator {
    services: Arc<Services>,
}

impl Orchestrator {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Drive one video to a terminal state in the default
    /// continuity-preserving mode.
    pub async fn process_video(&self, video_id: &VideoId) -> WorkerResult<()> {
        self.process_video_with_mode(video_id, GenerationMode::Continuity)
            .await
    }

    /// Drive one video to a terminal state.
    ///
    /// Acquires the processing lock (refusing with [`WorkerError::Busy`] on
    /// contention) and releases it on every exit path, including panic and
    /// timeout. On failure the record is marked `failed` with the reason.
    pub async fn process_video_with_mode(
        &self,
        video_id: &VideoId,
        mode: GenerationMode,
    ) -> WorkerResult<()> {
        let s = &self.services;

        let record = s
            .videos
            .get(video_id)
            .await?
            .ok_or_else(|| WorkerError::InvalidState(format!("video {video_id} not found")))?;
        if record.status.is_terminal() {
            return Err(WorkerError::InvalidState(format!(
                "video {video_id} already {}",
                record.status
            )));
        }

        let metadata = LockMetadata {
            video_id: Some(record.id.clone()),
            user_id: Some(record.user_id.clone()),
            target_duration: Some(record.target_duration),
            estimated_completion: chrono::Duration::from_std(s.config.video_timeout)
                .ok()
                .map(|d| Utc::now() + d),
        };
        let lock_timeout = chrono::Duration::from_std(s.config.lock_timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));

        if s
            .locks
            .acquire(PROCESSING_LOCK_KEY, &s.worker_id, metadata, lock_timeout)
            .await?
            .is_none()
        {
            return Err(WorkerError::Busy);
        }

        let cancel = s.cancels.register(video_id);
        info!(video_id = %video_id, mode = ?mode, "Processing started");

        let run = std::panic::AssertUnwindSafe(tokio::time::timeout(
            s.config.video_timeout,
            self.run_pipeline(record, mode, cancel),
        ))
        .catch_unwind()
        .await;

        // Lock and cancel flag are cleared on every exit path.
        s.cancels.unregister(video_id);
        if let Err(e) = s.locks.release(PROCESSING_LOCK_KEY).await {
            error!(video_id = %video_id, error = %e, "Failed to release processing lock");
        }

        let result = match run {
            Ok(Ok(inner)) => inner,
            Ok(Err(_elapsed)) => Err(WorkerError::VideoTimeout),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(WorkerError::Panicked(message))
            }
        };

        if let Err(e) = &result {
            let message = match e {
                WorkerError::Cancelled => "cancelled".to_string(),
                other => other.to_string(),
            };
            if let Err(persist_err) = s
                .videos
                .mutate(video_id, |r| {
                    if !r.status.is_terminal() {
                        r.fail(message.clone());
                    }
                })
                .await
            {
                error!(video_id = %video_id, error = %persist_err, "Failed to persist failure");
            }
            warn!(video_id = %video_id, error = %e, "Processing failed");
        } else {
            info!(video_id = %video_id, "Processing completed");
        }

        result
    }

    /// Phases in order, honoring a recovery resume point and checking the
    /// cancel flag between phases.
    async fn run_pipeline(
        &self,
        record: VideoRecord,
        mode: GenerationMode,
        cancel: CancelFlag,
    ) -> WorkerResult<()> {
        let s = &self.services;
        let video_id = record.id.clone();
        s.layout.ensure_video_tree(&record.user_id, &video_id).await?;

        let start_phase = record.current_phase.unwrap_or(ProcessingPhase::Decomposing);
        let mut record = record;

        for phase in [
            ProcessingPhase::Decomposing,
            ProcessingPhase::Generating,
            ProcessingPhase::Stitching,
            ProcessingPhase::Audio,
            ProcessingPhase::Merging,
            ProcessingPhase::Transcoding,
        ] {
            if phase_index(phase) < phase_index(start_phase) {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(WorkerError::Cancelled);
            }

            // heartbeat so a long run cannot lose its lock mid-phase
            if let Err(e) = s
                .locks
                .extend(
                    PROCESSING_LOCK_KEY,
                    chrono::Duration::from_std(s.config.lock_timeout)
                        .unwrap_or_else(|_| chrono::Duration::minutes(30)),
                )
                .await
            {
                warn!(video_id = %video_id, error = %e, "Lock heartbeat failed");
            }

            record = match phase {
                ProcessingPhase::Decomposing => self.phase_decompose(record).await?,
                ProcessingPhase::Generating => {
                    crate::generate::phase_generate(self, record, mode, &cancel).await?
                }
                ProcessingPhase::Stitching => self.phase_stitch(record).await?,
                ProcessingPhase::Audio => self.phase_audio(record).await?,
                ProcessingPhase::Merging => self.phase_merge(record).await?,
                ProcessingPhase::Transcoding => self.phase_transcode(record).await?,
            };
        }

        // Artifacts are on disk and persisted before the terminal status.
        s.videos.mutate(&video_id, |r| r.complete()).await?;
        Ok(())
    }

    /// 0 → 5. Skips the LLM entirely when scenes came with the spec.
    async fn phase_decompose(&self, record: VideoRecord) -> WorkerResult<VideoRecord> {
        let s = &self.services;
        let logger = RunLogger::new(&record.id, "decomposing");
        let video_id = record.id.clone();

        let record = s
            .videos
            .mutate(&video_id, |r| r.begin_phase(ProcessingPhase::Decomposing))
            .await?;

        if record.scenes.len() == record.segment_count as usize
            && scenes_are_contiguous(&record.scenes)
        {
            logger.log_completion("scenes supplied by caller, skipping storyboard");
            return Ok(s
                .videos
                .mutate(&video_id, |r| r.set_progress(PROGRESS_DECOMPOSED))
                .await?);
        }

        logger.log_start("calling storyboard provider");

        let enhancement = match s
            .storyboard
            .enhance(&record.original_prompt, record.target_duration)
            .await
        {
            Ok(enhancement) => enhancement,
            Err(e) => {
                logger.log_warning(&format!("enhance failed, passing prompt through: {e}"));
                Enhancement::passthrough(&record.original_prompt, record.target_duration)
            }
        };

        let expected = record.segment_count as usize;
        let scenes = match s
            .storyboard
            .decompose(
                &enhancement.enhanced_prompt,
                record.target_duration,
                record.segment_duration,
            )
            .await
        {
            Ok(scenes) if scenes.len() == expected && scenes_are_contiguous(&scenes) => scenes,
            Ok(scenes) => {
                logger.log_warning(&format!(
                    "decomposition returned {} malformed scene(s), using fallback",
                    scenes.len()
                ));
                fallback_scenes(
                    &enhancement.enhanced_prompt,
                    record.target_duration,
                    record.segment_duration,
                )
            }
            Err(e) => {
                logger.log_warning(&format!("decomposition failed, using fallback: {e}"));
                fallback_scenes(
                    &enhancement.enhanced_prompt,
                    record.target_duration,
                    record.segment_duration,
                )
            }
        };

        logger.log_completion(&format!("storyboard ready with {} scenes", scenes.len()));
        Ok(s
            .videos
            .mutate(&video_id, |r| {
                r.enhanced_prompt = Some(enhancement.enhanced_prompt.clone());
                r.title = enhancement.title.clone();
                r.scenes = scenes.clone();
                r.set_progress(PROGRESS_DECOMPOSED);
            })
            .await?)
    }

    /// 70 → 80. Enumerate segment files and stitch the 720p master.
    async fn phase_stitch(&self, record: VideoRecord) -> WorkerResult<VideoRecord> {
        let s = &self.services;
        let logger = RunLogger::new(&record.id, "stitching");
        let video_id = record.id.clone();

        let record = s
            .videos
            .mutate(&video_id, |r| {
                r.begin_phase(ProcessingPhase::Stitching);
                r.set_progress(PROGRESS_STITCH_FLOOR);
            })
            .await?;

        let files = s
            .layout
            .list_segment_files(&record.user_id, &video_id)
            .await?;
        if files.len() != record.segment_count as usize {
            return Err(WorkerError::IncompleteSegments {
                expected: record.segment_count,
                found: files.len() as u32,
            });
        }

        logger.log_start(&format!("stitching {} segments", files.len()));
        let out = s.layout.stitched_path(&record.user_id, &video_id);
        s.toolchain
            .stitch_crossfade(&files, &out, CROSSFADE_SECS)
            .await?;

        let duration = s.toolchain.probe(&out).await.ok().map(|i| i.duration);
        let artifact = s.layout.describe_artifact(&out, duration).await?;

        logger.log_completion("stitched master written");
        Ok(s
            .videos
            .mutate(&video_id, |r| {
                r.files.stitched_720p = Some(artifact.clone());
                r.set_progress(PROGRESS_STITCHED);
            })
            .await?)
    }

    /// 80 → 90. Build the script, synthesize, and fit it to the video.
    async fn phase_audio(&self, record: VideoRecord) -> WorkerResult<VideoRecord> {
        let s = &self.services;
        let logger = RunLogger::new(&record.id, "audio");
        let video_id = record.id.clone();

        let record = s
            .videos
            .mutate(&video_id, |r| r.begin_phase(ProcessingPhase::Audio))
            .await?;

        let script = self.narration_script(&record, &logger).await?;
        let estimated = s.narration.estimate_duration(&script);
        logger.log_progress(&format!(
            "script is {} words, roughly {estimated}s spoken",
            script.split_whitespace().count()
        ));

        let voice_id = record
            .metadata
            .voice_id
            .clone()
            .unwrap_or_else(|| s.config.default_voice_id.clone());

        let policy = RetryPolicy::new(s.config.max_segment_retries);
        let bytes = run_with_retry(&policy, "synthesize narration", |_| {
            let script = script.clone();
            let voice_id = voice_id.clone();
            async move {
                Ok(s
                    .narration
                    .synthesize(&script, &voice_id, &VoiceSettings::default())
                    .await?)
            }
        })
        .await?;

        let audio_path = s.layout.audio_path(&record.user_id, &video_id);
        tokio::fs::write(&audio_path, &bytes).await?;

        // Fit narration to the stitched master before merging.
        let stitched = s.layout.stitched_path(&record.user_id, &video_id);
        let report = s
            .sync
            .verify(&stitched, &audio_path, crate::sync::DEFAULT_SYNC_TOLERANCE_SECS)
            .await?;
        if report.diff.abs() > AUDIO_ADJUST_THRESHOLD_SECS {
            logger.log_progress(&format!(
                "narration off by {:.2}s ({:?}), adjusting",
                report.diff, report.recommendation
            ));
            let adjusted = audio_path.with_extension("adjusted.mp3");
            s.sync
                .adjust_audio(&audio_path, report.video_duration, &adjusted)
                .await?;
            tokio::fs::rename(&adjusted, &audio_path).await?;
        }

        let duration = s
            .toolchain
            .probe_media(&audio_path)
            .await
            .ok()
            .map(|i| i.duration);
        let artifact = s.layout.describe_artifact(&audio_path, duration).await?;

        logger.log_completion("narration synthesized");
        Ok(s
            .videos
            .mutate(&video_id, |r| {
                r.files.audio = Some(artifact.clone());
                r.metadata.voice_id = Some(voice_id.clone());
                r.metadata.voice_name = Some(s.config.default_voice_name.clone());
                r.set_progress(PROGRESS_AUDIO_DONE);
            })
            .await?)
    }

    /// The narration script: scene narrations joined when complete,
    /// otherwise written by the storyboard provider.
    async fn narration_script(
        &self,
        record: &VideoRecord,
        logger: &RunLogger,
    ) -> WorkerResult<String> {
        let narrations: Vec<&str> = record
            .scenes
            .iter()
            .filter_map(|scene| scene.narration_text.as_deref())
            .filter(|text| !text.trim().is_empty())
            .collect();

        if narrations.len() == record.scenes.len() && !record.scenes.is_empty() {
            logger.log_progress("using per-scene narration");
            return Ok(narrations.join(" "));
        }

        logger.log_progress("scenes lack narration, asking storyboard provider");
        let prompt = record
            .enhanced_prompt
            .as_deref()
            .unwrap_or(&record.original_prompt);

        let services = &self.services;
        let scenes = &record.scenes;
        let target_duration = record.target_duration;
        let policy = RetryPolicy::new(services.config.max_segment_retries);
        run_with_retry(&policy, "write narration", |_| async move {
            Ok(services
                .storyboard
                .write_narration(prompt, scenes, target_duration)
                .await?)
        })
        .await
    }

    /// 90 → 95. Merge, thumbnail, probe the final.
    async fn phase_merge(&self, record: VideoRecord) -> WorkerResult<VideoRecord> {
        let s = &self.services;
        let logger = RunLogger::new(&record.id, "merging");
        let video_id = record.id.clone();

        let record = s
            .videos
            .mutate(&video_id, |r| r.begin_phase(ProcessingPhase::Merging))
            .await?;

        let stitched = s.layout.stitched_path(&record.user_id, &video_id);
        let audio = s.layout.audio_path(&record.user_id, &video_id);
        let final_720 = s.layout.final_720p_path(&record.user_id, &video_id);

        s.toolchain
            .merge_av(&stitched, &audio, &final_720, true)
            .await?;

        let thumbnail_path = s.layout.thumbnail_path(&record.user_id, &video_id);
        let thumbnail = match s
            .toolchain
            .generate_thumbnail(&final_720, &thumbnail_path)
            .await
        {
            Ok(path) => Some(s.layout.describe_artifact(&path, None).await?),
            Err(e) => {
                logger.log_warning(&format!("thumbnail generation failed: {e}"));
                None
            }
        };

        let merged = s.sync.verify_merged(&final_720).await?;
        if !merged.has_audio {
            logger.log_warning("merged output is missing its audio stream");
        }
        let validation = s.sync.validate(&final_720).await?;
        for warning in &validation.warnings {
            logger.log_warning(warning);
        }

        let info = s.toolchain.probe(&final_720).await?;
        let artifact = s
            .layout
            .describe_artifact(&final_720, Some(info.duration))
            .await?;

        logger.log_completion(&format!("final 720p merged, {:.1}s", info.duration));
        Ok(s
            .videos
            .mutate(&video_id, |r| {
                r.files.final_720p = Some(artifact.clone());
                r.files.thumbnail = thumbnail.clone();
                r.actual_duration = Some(info.duration);
                r.metadata.width = Some(info.width);
                r.metadata.height = Some(info.height);
                r.metadata.fps = Some(info.fps);
                r.metadata.codec = Some(info.codec.clone());
                r.set_progress(PROGRESS_MERGED);
            })
            .await?)
    }

    /// 95 → 100. Derive the 480p rendition.
    async fn phase_transcode(&self, record: VideoRecord) -> WorkerResult<VideoRecord> {
        let s = &self.services;
        let logger = RunLogger::new(&record.id, "transcoding");
        let video_id = record.id.clone();

        let record = s
            .videos
            .mutate(&video_id, |r| r.begin_phase(ProcessingPhase::Transcoding))
            .await?;

        let final_720 = s.layout.final_720p_path(&record.user_id, &video_id);
        let final_480 = s.layout.final_480p_path(&record.user_id, &video_id);

        s.toolchain
            .transcode(&final_720, &final_480, FINAL_480_WIDTH, FINAL_480_HEIGHT)
            .await?;

        let duration = s.toolchain.probe(&final_480).await.ok().map(|i| i.duration);
        let artifact = s.layout.describe_artifact(&final_480, duration).await?;

        logger.log_completion("480p rendition written");
        Ok(s
            .videos
            .mutate(&video_id, |r| {
                r.files.final_480p = Some(artifact.clone());
            })
            .await?)
    }
}

fn phase_index(phase: ProcessingPhase) -> usize {
    match phase {
        ProcessingPhase::Decomposing => 0,
        ProcessingPhase::Generating => 1,
        ProcessingPhase::Stitching => 2,
        ProcessingPhase::Audio => 3,
        ProcessingPhase::Merging => 4,
        ProcessingPhase::Transcoding => 5,
    }
}
