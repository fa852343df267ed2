//! Storyboard scenes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::timing;

/// Maximum length of a scene prompt.
pub const MAX_SCENE_PROMPT_LEN: usize = 2000;

/// Maximum length of a scene's narration text.
pub const MAX_NARRATION_LEN: usize = 500;

/// Transition into the following scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    #[default]
    Crossfade,
    Cut,
}

impl TransitionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionType::Crossfade => "crossfade",
            TransitionType::Cut => "cut",
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One storyboard unit, 1:1 with a generated segment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// 1-based position in the storyboard
    pub scene_number: u32,

    /// Prompt sent to the video-segment provider
    pub scene_prompt: String,

    /// Extra visual direction from the storyboard author
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_description: Option<String>,

    /// Notes tying this scene to its neighbors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuity_notes: Option<String>,

    /// Voice-over line for this scene
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration_text: Option<String>,

    /// Offset into the finished video, seconds
    pub start_time: f64,

    /// End offset into the finished video, seconds
    pub end_time: f64,

    /// Transition into the next scene
    #[serde(default)]
    pub transition_type: TransitionType,
}

/// Scene-level validation failures.
#[derive(Debug, Error)]
pub enum SceneValidationError {
    #[error("scene {0}: prompt is empty")]
    EmptyPrompt(u32),

    #[error("scene {scene}: prompt is {len} chars (max {max})")]
    PromptTooLong { scene: u32, len: usize, max: usize },

    #[error("scene {scene}: narration is {len} chars (max {max})")]
    NarrationTooLong { scene: u32, len: usize, max: usize },

    #[error("scene {scene}: time range [{start}, {end}) is invalid")]
    InvalidTimeRange { scene: u32, start: f64, end: f64 },
}

impl Scene {
    /// Validate field-level constraints.
    pub fn validate(&self) -> Result<(), SceneValidationError> {
        if self.scene_prompt.trim().is_empty() {
            return Err(SceneValidationError::EmptyPrompt(self.scene_number));
        }
        if self.scene_prompt.len() > MAX_SCENE_PROMPT_LEN {
            return Err(SceneValidationError::PromptTooLong {
                scene: self.scene_number,
                len: self.scene_prompt.len(),
                max: MAX_SCENE_PROMPT_LEN,
            });
        }
        if let Some(narration) = &self.narration_text {
            if narration.len() > MAX_NARRATION_LEN {
                return Err(SceneValidationError::NarrationTooLong {
                    scene: self.scene_number,
                    len: narration.len(),
                    max: MAX_NARRATION_LEN,
                });
            }
        }
        if self.end_time <= self.start_time {
            return Err(SceneValidationError::InvalidTimeRange {
                scene: self.scene_number,
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(())
    }

    /// Scene length in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Check that scenes are ordered 1..N and cover contiguous time ranges.
pub fn scenes_are_contiguous(scenes: &[Scene]) -> bool {
    let mut expected_start = 0.0f64;
    for (i, scene) in scenes.iter().enumerate() {
        if scene.scene_number != (i + 1) as u32 {
            return false;
        }
        if (scene.start_time - expected_start).abs() > 1e-6 {
            return false;
        }
        if scene.end_time <= scene.start_time {
            return false;
        }
        expected_start = scene.end_time;
    }
    true
}

/// Deterministic decomposition used when the storyboard provider fails:
/// N scenes that reuse the original prompt, crossfade transitions,
/// contiguous time ranges.
pub fn fallback_scenes(prompt: &str, target_duration: u32, segment_duration: u32) -> Vec<Scene> {
    let count = timing::segment_count(target_duration, segment_duration);
    (1..=count)
        .map(|n| {
            let (start_time, end_time) = timing::scene_bounds(n, segment_duration, target_duration);
            Scene {
                scene_number: n,
                scene_prompt: format!("{} — Scene {} of {}", prompt, n, count),
                visual_description: None,
                continuity_notes: None,
                narration_text: None,
                start_time,
                end_time,
                transition_type: TransitionType::Crossfade,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_scenes_are_contiguous() {
        let scenes = fallback_scenes("A majestic eagle soaring", 60, 12);
        assert_eq!(scenes.len(), 5);
        assert!(scenes_are_contiguous(&scenes));
        assert!(scenes[0].scene_prompt.contains("Scene 1 of 5"));
        assert_eq!(scenes[4].end_time, 60.0);
    }

    #[test]
    fn test_fallback_truncates_last_scene() {
        let scenes = fallback_scenes("prompt", 50, 12);
        assert_eq!(scenes.len(), 5);
        let last = scenes.last().unwrap();
        assert_eq!(last.start_time, 48.0);
        assert_eq!(last.end_time, 50.0);
    }

    #[test]
    fn test_validation_rejects_long_prompt() {
        let mut scene = fallback_scenes("p", 12, 12).remove(0);
        scene.scene_prompt = "x".repeat(MAX_SCENE_PROMPT_LEN + 1);
        assert!(matches!(
            scene.validate(),
            Err(SceneValidationError::PromptTooLong { .. })
        ));
    }

    #[test]
    fn test_contiguity_rejects_gaps() {
        let mut scenes = fallback_scenes("p", 24, 12);
        scenes[1].start_time = 13.0;
        assert!(!scenes_are_contiguous(&scenes));
    }
}
