//! Wire-independent provider types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use vidgen_models::timing;

/// Result of the storyboard author's prompt rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enhancement {
    pub enhanced_prompt: String,
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub estimated_duration: Option<u32>,
}

impl Enhancement {
    /// Degraded enhancement when the provider fails: the input unchanged
    /// with a derived title.
    pub fn passthrough(prompt: &str, target_duration: u32) -> Self {
        Self {
            enhanced_prompt: prompt.to_string(),
            title: timing::derive_title(prompt),
            keywords: Vec::new(),
            estimated_duration: Some(target_duration),
        }
    }
}

/// State of a segment generation job at the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentJobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// One poll result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentJobStatus {
    pub state: SegmentJobState,
    /// IDs of the produced generations, set when succeeded
    #[serde(default)]
    pub generation_ids: Vec<String>,
    /// Provider failure reason, set when failed
    #[serde(default)]
    pub error: Option<String>,
}

/// Visual continuity carried from segment i to segment i+1.
///
/// Providers that cannot condition on an image use the text note only;
/// providers may also ignore the hint entirely.
#[derive(Debug, Clone, Default)]
pub struct ContinuityHint {
    /// Last frame of the previous segment
    pub frame_path: Option<PathBuf>,
    /// Text annotation appended to the prompt
    pub note: Option<String>,
}

impl ContinuityHint {
    pub fn from_frame(frame_path: PathBuf, previous_prompt: &str) -> Self {
        Self {
            frame_path: Some(frame_path),
            note: Some(format!(
                "Continue seamlessly from the previous shot: {previous_prompt}"
            )),
        }
    }
}

/// TTS voice tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

/// Marker inserted between scene narrations in a generated script.
pub const SCENE_BREAK: &str = "[SCENE BREAK]";
