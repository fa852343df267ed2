//! Structured run logging.
//!
//! Consistent, structured logging for pipeline runs with tracing spans and
//! contextual information.

use tracing::{error, info, info_span, warn, Span};

use vidgen_models::VideoId;

/// Run logger with consistent formatting: every line carries the video id
/// and the phase it happened in.
#[derive(Debug, Clone)]
pub struct RunLogger {
    video_id: String,
    phase: String,
}

impl RunLogger {
    pub fn new(video_id: &VideoId, phase: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            phase: phase.to_string(),
        }
    }

    /// Same run, different phase.
    pub fn for_phase(&self, phase: &str) -> Self {
        Self {
            video_id: self.video_id.clone(),
            phase: phase.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            phase = %self.phase,
            "Phase started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            phase = %self.phase,
            "Phase progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            video_id = %self.video_id,
            phase = %self.phase,
            "Phase warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            video_id = %self.video_id,
            phase = %self.phase,
            "Phase error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            video_id = %self.video_id,
            phase = %self.phase,
            "Phase completed: {}", message
        );
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        info_span!(
            "run",
            video_id = %self.video_id,
            phase = %self.phase
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_phase_keeps_video_id() {
        let id = VideoId::from_string("vid-1");
        let logger = RunLogger::new(&id, "decomposing");
        let next = logger.for_phase("generating");
        assert_eq!(next.video_id, "vid-1");
        assert_eq!(next.phase, "generating");
    }
}
