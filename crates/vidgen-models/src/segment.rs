//! Per-segment processing state.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Generation state of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    #[default]
    Pending,
    Generating,
    Completed,
    Failed,
}

impl SegmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Pending => "pending",
            SegmentStatus::Generating => "generating",
            SegmentStatus::Completed => "completed",
            SegmentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of a single generated clip.
///
/// `file_path` is present exactly when the segment is completed;
/// `last_frame_path` only ever exists for segments with a successor.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SegmentRecord {
    /// 1-based position in the run
    pub segment_number: u32,

    #[serde(default)]
    pub status: SegmentStatus,

    /// Provider job ID, persisted as soon as the provider returns it so a
    /// crash leaves a resumable hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    /// Path of the downloaded clip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Extracted last frame, used as the next segment's continuity hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame_path: Option<PathBuf>,

    /// Attempts spent on this segment
    #[serde(default)]
    pub retry_count: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SegmentRecord {
    /// A fresh pending slot.
    pub fn new(segment_number: u32) -> Self {
        Self {
            segment_number,
            status: SegmentStatus::Pending,
            job_id: None,
            file_path: None,
            last_frame_path: None,
            retry_count: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Transition to generating.
    pub fn mark_generating(&mut self) {
        self.status = SegmentStatus::Generating;
        self.started_at = Some(Utc::now());
        self.error_message = None;
    }

    /// Transition to completed with the clip on disk.
    pub fn mark_completed(&mut self, file_path: PathBuf) {
        self.status = SegmentStatus::Completed;
        self.file_path = Some(file_path);
        self.completed_at = Some(Utc::now());
        self.error_message = None;
    }

    /// Transition to failed.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = SegmentStatus::Failed;
        self.error_message = Some(error.into());
    }

    /// Reset to pending, keeping the retry counter.
    pub fn reset(&mut self) {
        self.status = SegmentStatus::Pending;
        self.job_id = None;
        self.file_path = None;
        self.error_message = None;
    }

    /// Derived progress for pollers: completed 100, generating 50, else 0.
    pub fn progress(&self) -> u8 {
        match self.status {
            SegmentStatus::Completed => 100,
            SegmentStatus::Generating => 50,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_lifecycle() {
        let mut segment = SegmentRecord::new(3);
        assert_eq!(segment.progress(), 0);

        segment.mark_generating();
        assert_eq!(segment.status, SegmentStatus::Generating);
        assert_eq!(segment.progress(), 50);
        assert!(segment.started_at.is_some());

        segment.mark_completed(PathBuf::from("/tmp/segment_003.mp4"));
        assert_eq!(segment.progress(), 100);
        assert!(segment.file_path.is_some());
        assert!(segment.completed_at.is_some());
    }

    #[test]
    fn test_reset_keeps_retry_count() {
        let mut segment = SegmentRecord::new(1);
        segment.retry_count = 2;
        segment.mark_failed("provider exploded");
        segment.reset();
        assert_eq!(segment.status, SegmentStatus::Pending);
        assert_eq!(segment.retry_count, 2);
        assert!(segment.error_message.is_none());
    }
}
