//! Capability traits the orchestrator depends on.

use async_trait::async_trait;

use vidgen_models::encoding::NARRATION_WORDS_PER_SEC;
use vidgen_models::Scene;

use crate::error::ProviderResult;
use crate::types::{ContinuityHint, Enhancement, SegmentJobStatus, VoiceSettings};

/// Storyboard author: prompt enhancement, scene decomposition, narration
/// script writing.
#[async_trait]
pub trait StoryboardProvider: Send + Sync {
    /// Rewrite the prompt and derive a title/keywords.
    async fn enhance(&self, prompt: &str, target_duration: u32) -> ProviderResult<Enhancement>;

    /// Break the prompt into `ceil(target/segment)` ordered, contiguous
    /// scenes.
    async fn decompose(
        &self,
        prompt: &str,
        target_duration: u32,
        segment_duration: u32,
    ) -> ProviderResult<Vec<Scene>>;

    /// Write a narration script with `[SCENE BREAK]` markers between
    /// scenes.
    async fn write_narration(
        &self,
        prompt: &str,
        scenes: &[Scene],
        target_duration: u32,
    ) -> ProviderResult<String>;
}

/// Text-to-video generation, job based.
#[async_trait]
pub trait VideoSegmentProvider: Send + Sync {
    /// Submit a generation job, returning its ID.
    async fn start(
        &self,
        scene_prompt: &str,
        width: u32,
        height: u32,
        n_seconds: u32,
        continuity_hint: Option<&ContinuityHint>,
    ) -> ProviderResult<String>;

    /// Poll a job's state.
    async fn poll(&self, job_id: &str) -> ProviderResult<SegmentJobStatus>;

    /// Download the bytes of a finished generation.
    async fn fetch_content(&self, generation_id: &str) -> ProviderResult<Vec<u8>>;
}

/// Text-to-speech synthesis.
#[async_trait]
pub trait NarrationProvider: Send + Sync {
    /// Synthesize the script to mp3 bytes.
    async fn synthesize(
        &self,
        script: &str,
        voice_id: &str,
        settings: &VoiceSettings,
    ) -> ProviderResult<Vec<u8>>;

    /// Estimated spoken length: ceil(words / 2.5) seconds.
    fn estimate_duration(&self, text: &str) -> u32 {
        let words = text.split_whitespace().count() as f64;
        (words / NARRATION_WORDS_PER_SEC).ceil() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;

    struct SilentNarrator;

    #[async_trait]
    impl NarrationProvider for SilentNarrator {
        async fn synthesize(
            &self,
            _script: &str,
            _voice_id: &str,
            _settings: &VoiceSettings,
        ) -> ProviderResult<Vec<u8>> {
            Err(ProviderError::Config("not wired".into()))
        }
    }

    #[test]
    fn test_estimate_duration_rounds_up() {
        let narrator = SilentNarrator;
        // 5 words at 2.5 words/sec = 2s
        assert_eq!(narrator.estimate_duration("one two three four five"), 2);
        // 6 words = 2.4s, rounds up to 3
        assert_eq!(narrator.estimate_duration("one two three four five six"), 3);
        assert_eq!(narrator.estimate_duration(""), 0);
    }
}
