//! The generating phase: one provider job per segment.
//!
//! Sequential by default so each segment can hand its last frame to the
//! next as a continuity hint. Batch mode generates several segments
//! concurrently, trading continuity for throughput; it is never enabled
//! implicitly.

use futures::TryStreamExt;
use tracing::warn;

use vidgen_media::MediaToolchain;
use vidgen_models::encoding::{GENERATION_HEIGHT, GENERATION_WIDTH};
use vidgen_models::{ProcessingPhase, Scene, SegmentStatus, VideoRecord};
use vidgen_providers::{ContinuityHint, ProviderError, SegmentJobState, VideoSegmentProvider};

use crate::cancel::CancelFlag;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::pipeline::Orchestrator;
use crate::retry::RetryPolicy;

/// How the generating phase schedules provider jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationMode {
    /// One segment at a time, passing last-frame continuity hints.
    #[default]
    Continuity,
    /// Up to `batch_size` segments in parallel, no continuity hints.
    Batch { batch_size: usize },
}

/// Progress after finishing the 1-based segment `i` of `n`:
/// `round(5 + 65 * (i - 0.5) / n)`.
fn generation_progress(i: u32, n: u32) -> u8 {
    (5.0 + 65.0 * (i as f64 - 0.5) / n as f64).round() as u8
}

/// 5 → 70.
pub(crate) async fn phase_generate(
    orchestrator: &Orchestrator,
    record: VideoRecord,
    mode: GenerationMode,
    cancel: &CancelFlag,
) -> WorkerResult<VideoRecord> {
    let s = orchestrator.services();
    let video_id = record.id.clone();

    let record = s
        .videos
        .mutate(&video_id, |r| r.begin_phase(ProcessingPhase::Generating))
        .await?;

    match mode {
        GenerationMode::Batch { batch_size } if s.config.max_concurrent_jobs > 1 => {
            let width = batch_size.clamp(1, s.config.max_concurrent_jobs);
            generate_batch(orchestrator, record, width, cancel).await
        }
        GenerationMode::Batch { .. } => {
            warn!(
                video_id = %video_id,
                "Batch mode requested but MAX_CONCURRENT_JOBS is 1, generating sequentially"
            );
            generate_sequential(orchestrator, record, cancel).await
        }
        GenerationMode::Continuity => generate_sequential(orchestrator, record, cancel).await,
    }
}

async fn generate_sequential(
    orchestrator: &Orchestrator,
    mut record: VideoRecord,
    cancel: &CancelFlag,
) -> WorkerResult<VideoRecord> {
    let s = orchestrator.services();
    let video_id = record.id.clone();
    let logger = RunLogger::new(&video_id, "generating");
    let n = record.segment_count;

    let mut continuity: Option<ContinuityHint> = None;

    for i in 1..=n {
        if cancel.is_cancelled() {
            return Err(WorkerError::Cancelled);
        }

        let scene = scene_for(&record, i)?;

        if record.segments[(i - 1) as usize].status == SegmentStatus::Completed {
            // resumed run: rebuild the hint from the persisted frame
            continuity = continuity_from(&record, i);
            continue;
        }

        record = s
            .videos
            .mutate(&video_id, |r| {
                r.current_segment = Some(i);
                r.segments[(i - 1) as usize].mark_generating();
            })
            .await?;

        let segment_path = s.layout.segment_path(&record.user_id, &video_id, i);

        let cache_hit = s.cache.copy_to(&scene.scene_prompt, i, &segment_path).await?;
        if cache_hit {
            logger.log_progress(&format!("segment {i}/{n} from cache"));
        } else {
            generate_segment_with_retry(
                orchestrator,
                &mut record,
                i,
                &scene,
                &segment_path,
                continuity.as_ref(),
                cancel,
            )
            .await?;

            let duration = s
                .toolchain
                .probe(&segment_path)
                .await
                .ok()
                .map(|info| info.duration);
            if let Err(e) = s
                .cache
                .store(&scene.scene_prompt, i, &segment_path, duration)
                .await
            {
                warn!(segment = i, error = %e, "Failed to cache segment");
            }
        }

        record = s
            .videos
            .mutate(&video_id, |r| {
                r.segments[(i - 1) as usize].mark_completed(segment_path.clone());
                r.set_progress(generation_progress(i, n));
            })
            .await?;

        // Continuity frame only exists for segments with a successor.
        if i < n {
            let frame_path = s.layout.frame_path(&record.user_id, &video_id, i);
            match s
                .toolchain
                .extract_last_frame(&segment_path, &frame_path)
                .await
            {
                Ok(frame) => {
                    record = s
                        .videos
                        .mutate(&video_id, |r| {
                            r.segments[(i - 1) as usize].last_frame_path = Some(frame.clone());
                        })
                        .await?;
                    continuity = Some(ContinuityHint::from_frame(frame, &scene.scene_prompt));
                }
                Err(e) => {
                    // hint is best effort, the next segment just loses it
                    logger.log_warning(&format!("last-frame extraction failed: {e}"));
                    continuity = None;
                }
            }
        }

        logger.log_progress(&format!("segment {i}/{n} completed"));
    }

    Ok(s
        .videos
        .mutate(&video_id, |r| {
            r.current_segment = None;
        })
        .await?)
}

/// Parallel generation without continuity hints. Segment state still goes
/// through the store one mutation at a time.
async fn generate_batch(
    orchestrator: &Orchestrator,
    record: VideoRecord,
    width: usize,
    cancel: &CancelFlag,
) -> WorkerResult<VideoRecord> {
    let s = orchestrator.services();
    let video_id = record.id.clone();
    let logger = RunLogger::new(&video_id, "generating");
    let n = record.segment_count;

    let pending: Vec<u32> = record
        .segments
        .iter()
        .filter(|seg| seg.status != SegmentStatus::Completed)
        .map(|seg| seg.segment_number)
        .collect();
    logger.log_start(&format!(
        "batch generating {} segment(s), width {}",
        pending.len(),
        width
    ));

    futures::stream::iter(pending.into_iter().map(Ok::<u32, WorkerError>))
        .try_for_each_concurrent(width, |i| {
            let record = record.clone();
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return Err(WorkerError::Cancelled);
                }
                generate_one_batch_segment(orchestrator, &record, i, &cancel).await
            }
        })
        .await?;

    Ok(s
        .videos
        .mutate(&video_id, |r| {
            r.current_segment = None;
            r.set_progress(generation_progress(n, n));
        })
        .await?)
}

async fn generate_one_batch_segment(
    orchestrator: &Orchestrator,
    record: &VideoRecord,
    i: u32,
    cancel: &CancelFlag,
) -> WorkerResult<()> {
    let s = orchestrator.services();
    let video_id = record.id.clone();
    let n = record.segment_count;
    let scene = scene_for(record, i)?;

    let mut local = s
        .videos
        .mutate(&video_id, |r| r.segments[(i - 1) as usize].mark_generating())
        .await?;

    let segment_path = s.layout.segment_path(&record.user_id, &video_id, i);

    let cache_hit = s.cache.copy_to(&scene.scene_prompt, i, &segment_path).await?;
    if !cache_hit {
        generate_segment_with_retry(
            orchestrator,
            &mut local,
            i,
            &scene,
            &segment_path,
            None,
            cancel,
        )
        .await?;

        let duration = s
            .toolchain
            .probe(&segment_path)
            .await
            .ok()
            .map(|info| info.duration);
        if let Err(e) = s
            .cache
            .store(&scene.scene_prompt, i, &segment_path, duration)
            .await
        {
            warn!(segment = i, error = %e, "Failed to cache segment");
        }
    }

    s.videos
        .mutate(&video_id, |r| {
            r.segments[(i - 1) as usize].mark_completed(segment_path.clone());
            let done = r.completed_segments();
            r.set_progress(generation_progress(done, n));
        })
        .await?;

    if i < n {
        let frame_path = s.layout.frame_path(&record.user_id, &video_id, i);
        if let Ok(frame) = s
            .toolchain
            .extract_last_frame(&segment_path, &frame_path)
            .await
        {
            s.videos
                .mutate(&video_id, |r| {
                    r.segments[(i - 1) as usize].last_frame_path = Some(frame.clone());
                })
                .await?;
        }
    }

    Ok(())
}

/// Retry loop for one segment. Every failed attempt bumps the persisted
/// retry counter; exhaustion fails the segment and thereby the run.
async fn generate_segment_with_retry(
    orchestrator: &Orchestrator,
    record: &mut VideoRecord,
    i: u32,
    scene: &Scene,
    segment_path: &std::path::Path,
    continuity: Option<&ContinuityHint>,
    cancel: &CancelFlag,
) -> WorkerResult<()> {
    let s = orchestrator.services();
    let video_id = record.id.clone();
    let policy = RetryPolicy::new(s.config.max_segment_retries);

    let mut attempt = 1u32;
    loop {
        match attempt_segment(orchestrator, record, i, scene, segment_path, continuity, cancel)
            .await
        {
            Ok(()) => return Ok(()),
            Err(WorkerError::Cancelled) => return Err(WorkerError::Cancelled),
            Err(e) => {
                *record = s
                    .videos
                    .mutate(&video_id, |r| {
                        r.segments[(i - 1) as usize].retry_count += 1;
                    })
                    .await?;

                if e.is_retryable() && attempt < policy.max_attempts {
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        segment = i,
                        attempt,
                        ?delay,
                        error = %e,
                        "Segment attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                } else {
                    let reason = e.to_string();
                    s.videos
                        .mutate(&video_id, |r| {
                            r.segments[(i - 1) as usize].mark_failed(reason.clone());
                        })
                        .await?;
                    return Err(WorkerError::segment_failed(i, reason));
                }
            }
        }
    }
}

/// One start/poll/download attempt.
async fn attempt_segment(
    orchestrator: &Orchestrator,
    record: &mut VideoRecord,
    i: u32,
    scene: &Scene,
    segment_path: &std::path::Path,
    continuity: Option<&ContinuityHint>,
    cancel: &CancelFlag,
) -> WorkerResult<()> {
    let s = orchestrator.services();
    let video_id = record.id.clone();
    let n_seconds = scene.duration().round().max(1.0) as u32;

    let job_id = s
        .segments
        .start(
            &scene.scene_prompt,
            GENERATION_WIDTH,
            GENERATION_HEIGHT,
            n_seconds,
            continuity,
        )
        .await?;

    // persisted before the first poll so a crash leaves a resumable hint
    *record = s
        .videos
        .mutate(&video_id, |r| {
            r.segments[(i - 1) as usize].job_id = Some(job_id.clone());
        })
        .await?;

    let started = tokio::time::Instant::now();
    let generation_id = loop {
        if cancel.is_cancelled() {
            return Err(WorkerError::Cancelled);
        }

        let status = s.segments.poll(&job_id).await?;
        match status.state {
            SegmentJobState::Succeeded => {
                break status.generation_ids.first().cloned().ok_or_else(|| {
                    ProviderError::InvalidResponse("job succeeded without generations".into())
                })?;
            }
            SegmentJobState::Failed => {
                return Err(ProviderError::JobFailed(
                    status.error.unwrap_or_else(|| "unknown provider failure".into()),
                )
                .into());
            }
            SegmentJobState::Pending | SegmentJobState::Running => {
                if started.elapsed() > s.config.segment_timeout {
                    return Err(WorkerError::SegmentTimeout { segment: i });
                }
                tokio::time::sleep(s.config.polling_interval).await;
            }
        }
    };

    let bytes = s.segments.fetch_content(&generation_id).await?;
    if let Some(parent) = segment_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(segment_path, &bytes).await?;

    Ok(())
}

fn scene_for(record: &VideoRecord, i: u32) -> WorkerResult<Scene> {
    record
        .scenes
        .get((i - 1) as usize)
        .cloned()
        .ok_or_else(|| WorkerError::InvalidState(format!("no scene for segment {i}")))
}

fn continuity_from(record: &VideoRecord, i: u32) -> Option<ContinuityHint> {
    let segment = &record.segments[(i - 1) as usize];
    let scene = record.scenes.get((i - 1) as usize)?;
    segment
        .last_frame_path
        .clone()
        .map(|frame| ContinuityHint::from_frame(frame, &scene.scene_prompt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_progress_formula() {
        // segment 1 of 5: 5 + 65 * 0.5/5 = 11.5 -> 12
        assert_eq!(generation_progress(1, 5), 12);
        // segment 5 of 5: 5 + 65 * 4.5/5 = 63.5 -> 64 (stitching starts at 70)
        assert_eq!(generation_progress(5, 5), 64);
        // single segment: 5 + 65 * 0.5 = 37.5 -> 38
        assert_eq!(generation_progress(1, 1), 38);
    }

    #[test]
    fn test_progress_is_monotonic_in_segment_index() {
        let mut last = 0u8;
        for i in 1..=10 {
            let p = generation_progress(i, 10);
            assert!(p > last);
            last = p;
        }
        assert!(last < 70);
    }
}
