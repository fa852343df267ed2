//! FFmpeg/ffprobe toolchain adapter.
//!
//! Command building, probing, frame extraction, crossfade stitching, A/V
//! merge, transcoding and narration adjustment, behind the
//! [`MediaToolchain`] trait so the pipeline stays testable without the
//! binaries installed.

pub mod audio;
pub mod command;
pub mod error;
pub mod frames;
pub mod merge;
pub mod probe;
pub mod stitch;
pub mod toolchain;

pub use audio::adjust_audio;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{extract_frame_at, extract_last_frame, generate_thumbnail};
pub use merge::{merge_av, transcode};
pub use probe::{get_duration, probe_media, probe_streams, probe_video, MediaInfo, MergedStreams, VideoInfo};
pub use stitch::{concat_simple, stitch_crossfade};
pub use toolchain::{FfmpegToolchain, MediaToolchain};
