//! On-disk artifact layout for vidgen.
//!
//! Every path a run touches is derived from the storage root, the owner and
//! the video id; nothing is looked up. The tree:
//!
//! ```text
//! <root>/videos/<user_id>/<video_id>/
//!     segments/segment_NNN.mp4
//!     frames/frame_NNN.jpg
//!     stitched_720p.mp4
//!     final_720p.mp4
//!     final_480p.mp4
//!     audio.mp3
//!     thumbnail.jpg
//! <root>/cache/segments/<hash>.mp4 + manifest.json
//! <root>/temp/processing/
//! <root>/db/
//! ```

pub mod error;
pub mod layout;

pub use error::{StorageError, StorageResult};
pub use layout::{StorageLayout, StorageStats};
