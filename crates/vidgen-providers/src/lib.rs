//! Provider adapters: storyboard LLM, text-to-video segments, TTS voice.
//!
//! The orchestrator depends on the three capability traits; the HTTP
//! implementations here are swappable for fakes in tests.

pub mod error;
pub mod narration;
pub mod segments;
pub mod storyboard;
pub mod traits;
pub mod types;

pub use error::{message_is_transient, ProviderError, ProviderResult};
pub use narration::{HttpNarrationProvider, TtsConfig};
pub use segments::{HttpVideoSegmentProvider, SegmentApiConfig};
pub use storyboard::{HttpStoryboardProvider, StoryboardConfig};
pub use traits::{NarrationProvider, StoryboardProvider, VideoSegmentProvider};
pub use types::{
    ContinuityHint, Enhancement, SegmentJobState, SegmentJobStatus, VoiceSettings, SCENE_BREAK,
};
