//! The processing orchestrator and its utilities.
//!
//! This crate owns the six-phase pipeline (decomposing, generating,
//! stitching, audio, merging, transcoding) plus the machinery around it:
//! the retry policy, the content-addressed segment cache, crash recovery,
//! audio/video sync verification and per-run cancellation.

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod generate;
pub mod logging;
pub mod pipeline;
pub mod recovery;
pub mod retry;
pub mod services;
pub mod sync;

pub use cache::SegmentCache;
pub use cancel::{CancelFlag, CancelRegistry};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use generate::GenerationMode;
pub use logging::RunLogger;
pub use pipeline::Orchestrator;
pub use recovery::{RecoveryDecision, RecoveryPlanner};
pub use retry::{run_with_retry, RetryPolicy};
pub use services::Services;
pub use sync::{SyncRecommendation, SyncReport, SyncVerifier, ValidationReport};
