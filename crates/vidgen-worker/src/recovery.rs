//! Crash recovery.
//!
//! Decides, from the last persisted status and the artifacts on disk, where
//! an interrupted run can resume. Planning is pure given those inputs, so
//! running it twice yields the same decision.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use vidgen_models::{ProcessingPhase, SegmentStatus, VideoId, VideoRecord, VideoStatus};
use vidgen_storage::StorageLayout;
use vidgen_store::VideoRepository;

use crate::error::WorkerResult;

/// How long a run may go untouched before the sweep considers it
/// interrupted.
pub const STALE_AFTER_MINUTES: i64 = 30;

/// Where an interrupted run can pick up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Re-enter the generating phase at this 1-based segment.
    ResumeGenerating { next_segment: u32 },
    /// All segments are on disk; re-enter at stitching.
    ResumeStitching,
    /// The stitched master exists; re-enter at audio.
    ResumeAudio,
    /// Terminal or never-started runs are left alone.
    NotRecoverable,
}

/// Plans and applies recovery for interrupted runs.
#[derive(Clone)]
pub struct RecoveryPlanner {
    videos: VideoRepository,
    layout: StorageLayout,
}

impl RecoveryPlanner {
    pub fn new(videos: VideoRepository, layout: StorageLayout) -> Self {
        Self { videos, layout }
    }

    /// Decide how to resume `record`, consulting the disk where the
    /// persisted status alone is not enough.
    pub async fn plan(&self, record: &VideoRecord) -> RecoveryDecision {
        match record.status {
            VideoStatus::Generating => self.plan_generating(record),
            VideoStatus::Stitching => self.plan_stitching(record).await,
            VideoStatus::Audio | VideoStatus::Merging | VideoStatus::Transcoding => {
                let stitched = self.layout.stitched_path(&record.user_id, &record.id);
                if self.layout.exists(&stitched).await {
                    RecoveryDecision::ResumeAudio
                } else {
                    self.plan_stitching(record).await
                }
            }
            VideoStatus::Pending
            | VideoStatus::Decomposing
            | VideoStatus::Completed
            | VideoStatus::Failed => RecoveryDecision::NotRecoverable,
        }
    }

    fn plan_generating(&self, record: &VideoRecord) -> RecoveryDecision {
        let prefix = record
            .segments
            .iter()
            .take_while(|s| s.status == SegmentStatus::Completed)
            .count() as u32;
        RecoveryDecision::ResumeGenerating {
            next_segment: prefix + 1,
        }
    }

    async fn plan_stitching(&self, record: &VideoRecord) -> RecoveryDecision {
        let on_disk = self
            .layout
            .list_segment_files(&record.user_id, &record.id)
            .await
            .map(|files| files.len() as u32)
            .unwrap_or(0);

        if on_disk == record.segment_count {
            RecoveryDecision::ResumeStitching
        } else {
            self.plan_generating(record)
        }
    }

    /// Apply a recovery decision: reset the run to `pending` pointed at the
    /// right phase, clearing the error. Returns the updated record, or
    /// `None` when the run is not recoverable.
    pub async fn apply(&self, video_id: &VideoId) -> WorkerResult<Option<VideoRecord>> {
        let Some(record) = self.videos.get(video_id).await? else {
            return Ok(None);
        };

        let decision = self.plan(&record).await;
        info!(video_id = %video_id, ?decision, "Recovery decision");

        let updated = match decision {
            RecoveryDecision::ResumeGenerating { next_segment } => {
                self.videos
                    .mutate(video_id, |r| {
                        r.status = VideoStatus::Pending;
                        r.current_phase = Some(ProcessingPhase::Generating);
                        r.current_segment = Some(next_segment);
                        r.error_message = None;
                        // any half-finished segment restarts from scratch
                        for segment in r.segments.iter_mut() {
                            if segment.status == SegmentStatus::Generating {
                                segment.reset();
                            }
                        }
                    })
                    .await?
            }
            RecoveryDecision::ResumeStitching => {
                self.videos
                    .mutate(video_id, |r| {
                        r.status = VideoStatus::Pending;
                        r.current_phase = Some(ProcessingPhase::Stitching);
                        r.current_segment = None;
                        r.error_message = None;
                    })
                    .await?
            }
            RecoveryDecision::ResumeAudio => {
                self.videos
                    .mutate(video_id, |r| {
                        r.status = VideoStatus::Pending;
                        r.current_phase = Some(ProcessingPhase::Audio);
                        r.current_segment = None;
                        r.error_message = None;
                    })
                    .await?
            }
            RecoveryDecision::NotRecoverable => return Ok(None),
        };

        Ok(Some(updated))
    }

    /// Find non-terminal runs untouched for 30 minutes. Recoverable ones
    /// are reset for resumption and returned; the rest are failed with
    /// "processing interrupted".
    pub async fn sweep_interrupted(&self) -> WorkerResult<Vec<VideoId>> {
        let cutoff = Utc::now() - Duration::minutes(STALE_AFTER_MINUTES);
        let mut resumable = Vec::new();

        for record in self.videos.list_all().await? {
            if record.status.is_terminal() || record.status == VideoStatus::Pending {
                continue;
            }
            if record.updated_at > cutoff {
                continue;
            }

            match self.apply(&record.id).await? {
                Some(_) => resumable.push(record.id.clone()),
                None => {
                    warn!(video_id = %record.id, status = %record.status, "Orphaned run, marking failed");
                    self.videos
                        .mutate(&record.id, |r| r.fail("processing interrupted"))
                        .await?;
                }
            }
        }

        Ok(resumable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use vidgen_store::JsonStore;

    async fn setup() -> (TempDir, RecoveryPlanner, VideoRepository, StorageLayout) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path().join("db")).await.unwrap();
        let videos = VideoRepository::new(store);
        let layout = StorageLayout::new(dir.path(), "http://localhost:3000/files");
        (
            dir,
            RecoveryPlanner::new(videos.clone(), layout.clone()),
            videos,
            layout,
        )
    }

    fn interrupted_during_generating(completed: u32) -> VideoRecord {
        let mut record = VideoRecord::new("user1", "an eagle", 60);
        record.status = VideoStatus::Generating;
        record.current_phase = Some(ProcessingPhase::Generating);
        for i in 0..completed as usize {
            record.segments[i].mark_completed(PathBuf::from(format!("segment_{:03}.mp4", i + 1)));
        }
        record
    }

    #[tokio::test]
    async fn test_generating_resumes_after_completed_prefix() {
        let (_dir, planner, videos, _layout) = setup().await;
        let record = interrupted_during_generating(2);
        videos.create(&record).await.unwrap();

        let decision = planner.plan(&record).await;
        assert_eq!(decision, RecoveryDecision::ResumeGenerating { next_segment: 3 });

        let updated = planner.apply(&record.id).await.unwrap().unwrap();
        assert_eq!(updated.status, VideoStatus::Pending);
        assert_eq!(updated.current_segment, Some(3));
        assert!(updated.error_message.is_none());
        assert_eq!(updated.completed_segments(), 2);
    }

    #[tokio::test]
    async fn test_recovery_is_idempotent() {
        let (_dir, planner, videos, _layout) = setup().await;
        let record = interrupted_during_generating(2);
        videos.create(&record).await.unwrap();

        // planning is pure: same state, same decision
        let first = planner.plan(&record).await;
        let second = planner.plan(&record).await;
        assert_eq!(first, second);
        assert_eq!(first, RecoveryDecision::ResumeGenerating { next_segment: 3 });

        // once applied, the run is pending-to-resume and not re-planned
        planner.apply(&record.id).await.unwrap();
        let reloaded = videos.get(&record.id).await.unwrap().unwrap();
        assert_eq!(reloaded.current_segment, Some(3));
        assert_eq!(planner.plan(&reloaded).await, RecoveryDecision::NotRecoverable);
    }

    #[tokio::test]
    async fn test_stitching_falls_back_when_segments_missing() {
        let (_dir, planner, videos, _layout) = setup().await;
        let mut record = interrupted_during_generating(5);
        record.status = VideoStatus::Stitching;
        videos.create(&record).await.unwrap();

        // nothing on disk, so stitching recovery degrades to generating
        let decision = planner.plan(&record).await;
        assert_eq!(decision, RecoveryDecision::ResumeGenerating { next_segment: 6 });
    }

    #[tokio::test]
    async fn test_stitching_resumes_when_all_segments_on_disk() {
        let (_dir, planner, videos, layout) = setup().await;
        let mut record = interrupted_during_generating(5);
        record.status = VideoStatus::Stitching;
        videos.create(&record).await.unwrap();

        layout.ensure_video_tree(&record.user_id, &record.id).await.unwrap();
        for n in 1..=5 {
            tokio::fs::write(layout.segment_path(&record.user_id, &record.id, n), b"clip")
                .await
                .unwrap();
        }

        assert_eq!(planner.plan(&record).await, RecoveryDecision::ResumeStitching);
    }

    #[tokio::test]
    async fn test_audio_resumes_when_stitched_exists() {
        let (_dir, planner, videos, layout) = setup().await;
        let mut record = interrupted_during_generating(5);
        record.status = VideoStatus::Merging;
        videos.create(&record).await.unwrap();

        layout.ensure_video_tree(&record.user_id, &record.id).await.unwrap();
        tokio::fs::write(layout.stitched_path(&record.user_id, &record.id), b"stitched")
            .await
            .unwrap();

        assert_eq!(planner.plan(&record).await, RecoveryDecision::ResumeAudio);
    }

    #[tokio::test]
    async fn test_terminal_runs_are_not_recoverable() {
        let (_dir, planner, _videos, _layout) = setup().await;
        let mut record = VideoRecord::new("user1", "an eagle", 60);
        record.complete();
        assert_eq!(planner.plan(&record).await, RecoveryDecision::NotRecoverable);

        let mut failed = VideoRecord::new("user1", "an eagle", 60);
        failed.fail("boom");
        assert_eq!(planner.plan(&failed).await, RecoveryDecision::NotRecoverable);
    }

    #[tokio::test]
    async fn test_sweep_fails_stale_unrecoverable_runs() {
        let (_dir, planner, videos, _layout) = setup().await;

        // decomposing runs cannot resume; make it stale
        let mut record = VideoRecord::new("user1", "an eagle", 60);
        record.status = VideoStatus::Decomposing;
        record.updated_at = Utc::now() - Duration::hours(1);
        videos.create(&record).await.unwrap();

        let resumable = planner.sweep_interrupted().await.unwrap();
        assert!(resumable.is_empty());

        let reloaded = videos.get(&record.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, VideoStatus::Failed);
        assert_eq!(reloaded.error_message.as_deref(), Some("processing interrupted"));
    }

    #[tokio::test]
    async fn test_sweep_resumes_stale_generating_runs() {
        let (_dir, planner, videos, _layout) = setup().await;

        let mut record = interrupted_during_generating(1);
        record.updated_at = Utc::now() - Duration::hours(1);
        videos.create(&record).await.unwrap();

        let resumable = planner.sweep_interrupted().await.unwrap();
        assert_eq!(resumable, vec![record.id.clone()]);

        let reloaded = videos.get(&record.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, VideoStatus::Pending);
        assert_eq!(reloaded.current_segment, Some(2));
    }
}
