//! Video record models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::scene::Scene;
use crate::segment::{SegmentRecord, SegmentStatus};
use crate::timing;

/// Unique identifier for a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Video processing status.
///
/// The pipeline advances strictly left to right; `Completed` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Waiting to be picked up by the orchestrator
    #[default]
    Pending,
    /// Storyboard decomposition in progress
    Decomposing,
    /// Segment generation in progress
    Generating,
    /// Crossfade stitching in progress
    Stitching,
    /// Narration synthesis in progress
    Audio,
    /// Audio/video merge in progress
    Merging,
    /// 480p transcode in progress
    Transcoding,
    /// Pipeline finished successfully
    Completed,
    /// Pipeline aborted
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Decomposing => "decomposing",
            VideoStatus::Generating => "generating",
            VideoStatus::Stitching => "stitching",
            VideoStatus::Audio => "audio",
            VideoStatus::Merging => "merging",
            VideoStatus::Transcoding => "transcoding",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }

    /// True while the orchestrator is actively advancing the run.
    pub fn is_processing(&self) -> bool {
        !matches!(
            self,
            VideoStatus::Pending | VideoStatus::Completed | VideoStatus::Failed
        )
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named phase of the pipeline, persisted separately from `status` so
/// recovery can reset `status` to `pending` while remembering where the run
/// was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingPhase {
    Decomposing,
    Generating,
    Stitching,
    Audio,
    Merging,
    Transcoding,
}

impl ProcessingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingPhase::Decomposing => "decomposing",
            ProcessingPhase::Generating => "generating",
            ProcessingPhase::Stitching => "stitching",
            ProcessingPhase::Audio => "audio",
            ProcessingPhase::Merging => "merging",
            ProcessingPhase::Transcoding => "transcoding",
        }
    }

    /// Status the run carries while this phase is active.
    pub fn status(&self) -> VideoStatus {
        match self {
            ProcessingPhase::Decomposing => VideoStatus::Decomposing,
            ProcessingPhase::Generating => VideoStatus::Generating,
            ProcessingPhase::Stitching => VideoStatus::Stitching,
            ProcessingPhase::Audio => VideoStatus::Audio,
            ProcessingPhase::Merging => VideoStatus::Merging,
            ProcessingPhase::Transcoding => VideoStatus::Transcoding,
        }
    }
}

impl fmt::Display for ProcessingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A produced artifact on disk.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactInfo {
    /// Absolute path under the storage root
    pub path: PathBuf,
    /// Public URL for the artifact
    pub url: String,
    /// File size in bytes
    pub size: u64,
    /// Container format (e.g. "mp4", "mp3", "jpg")
    pub format: String,
    /// Duration in seconds, where applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// The well-known artifacts of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct VideoFiles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stitched_720p: Option<ArtifactInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_720p: Option<ArtifactInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_480p: Option<ArtifactInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<ArtifactInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ArtifactInfo>,
}

/// Probed media details of the finished video plus the voice used.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_name: Option<String>,
}

/// A video and the full state of its processing run.
///
/// The prompt, duration and derived segment math are immutable after
/// creation; everything else is advanced by the orchestrator and read by
/// the API while polling.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    /// Unique video ID
    pub id: VideoId,

    /// User ID (owner)
    pub user_id: String,

    /// The prompt exactly as the user submitted it
    pub original_prompt: String,

    /// Storyboard-author rewrite of the prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_prompt: Option<String>,

    /// Short label derived during enhancement
    pub title: String,

    /// Requested duration in seconds
    pub target_duration: u32,

    /// Nominal per-segment duration in seconds
    pub segment_duration: u32,

    /// ceil(target_duration / segment_duration)
    pub segment_count: u32,

    /// Storyboard scenes, 1:1 with segments once decomposed
    #[serde(default)]
    pub scenes: Vec<Scene>,

    /// Run status
    #[serde(default)]
    pub status: VideoStatus,

    /// Overall progress, 0-100, non-decreasing until terminal
    #[serde(default)]
    pub progress: u8,

    /// Phase the run is in (or was interrupted in)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<ProcessingPhase>,

    /// 1-based segment the generator is working on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_segment: Option<u32>,

    /// Per-segment state, length == segment_count
    #[serde(default)]
    pub segments: Vec<SegmentRecord>,

    /// Produced artifacts
    #[serde(default)]
    pub files: VideoFiles,

    /// Probed details of the finished video
    #[serde(default)]
    pub metadata: RunMetadata,

    /// Measured duration of final_720p, set on merge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<f64>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Completion timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl VideoRecord {
    /// Create a new record with derived segment math and one pending
    /// segment slot per scene.
    pub fn new(
        user_id: impl Into<String>,
        original_prompt: impl Into<String>,
        target_duration: u32,
    ) -> Self {
        let original_prompt = original_prompt.into();
        let segment_duration = timing::segment_duration_for(target_duration);
        let segment_count = timing::segment_count(target_duration, segment_duration);
        let now = Utc::now();

        Self {
            id: VideoId::new(),
            user_id: user_id.into(),
            title: timing::derive_title(&original_prompt),
            original_prompt,
            enhanced_prompt: None,
            target_duration,
            segment_duration,
            segment_count,
            scenes: Vec::new(),
            status: VideoStatus::Pending,
            progress: 0,
            current_phase: None,
            current_segment: None,
            segments: (1..=segment_count).map(SegmentRecord::new).collect(),
            files: VideoFiles::default(),
            metadata: RunMetadata::default(),
            actual_duration: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Enter a phase: status and current_phase move together.
    pub fn begin_phase(&mut self, phase: ProcessingPhase) {
        self.status = phase.status();
        self.current_phase = Some(phase);
        self.updated_at = Utc::now();
    }

    /// Raise progress; values below the current one are ignored so observed
    /// progress is non-decreasing.
    pub fn set_progress(&mut self, progress: u8) {
        if progress > self.progress {
            self.progress = progress.min(100);
        }
        self.updated_at = Utc::now();
    }

    /// Mark the run completed.
    pub fn complete(&mut self) {
        self.status = VideoStatus::Completed;
        self.progress = 100;
        self.current_segment = None;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Mark the run failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = VideoStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
    }

    pub fn completed_segments(&self) -> u32 {
        self.segments
            .iter()
            .filter(|s| s.status == SegmentStatus::Completed)
            .count() as u32
    }

    pub fn failed_segments(&self) -> u32 {
        self.segments
            .iter()
            .filter(|s| s.status == SegmentStatus::Failed)
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_generation() {
        let id1 = VideoId::new();
        let id2 = VideoId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_record_initializes_segment_slots() {
        let record = VideoRecord::new("user123", "A majestic eagle soaring", 60);
        assert_eq!(record.segment_count, 5);
        assert_eq!(record.segments.len(), 5);
        assert_eq!(record.segments[0].segment_number, 1);
        assert_eq!(record.segments[4].segment_number, 5);
        assert_eq!(record.status, VideoStatus::Pending);
    }

    #[test]
    fn test_five_second_video_is_one_segment() {
        let record = VideoRecord::new("user123", "quick clip", 5);
        assert_eq!(record.segment_duration, 5);
        assert_eq!(record.segment_count, 1);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut record = VideoRecord::new("user123", "prompt", 60);
        record.set_progress(40);
        record.set_progress(20);
        assert_eq!(record.progress, 40);
        record.set_progress(70);
        assert_eq!(record.progress, 70);
    }

    #[test]
    fn test_completion_sets_terminal_fields() {
        let mut record = VideoRecord::new("user123", "prompt", 60);
        record.begin_phase(ProcessingPhase::Transcoding);
        record.complete();
        assert_eq!(record.status, VideoStatus::Completed);
        assert_eq!(record.progress, 100);
        assert!(record.completed_at.is_some());
        assert!(record.status.is_terminal());
    }
}
