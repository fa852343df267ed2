//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Processing lock is held, refusing work")]
    Busy,

    #[error("Segment {segment} failed: {reason}")]
    SegmentFailed { segment: u32, reason: String },

    #[error("Segment {segment} timed out")]
    SegmentTimeout { segment: u32 },

    #[error("Video processing timed out")]
    VideoTimeout,

    #[error("cancelled")]
    Cancelled,

    #[error("Expected {expected} segment files on disk, found {found}")]
    IncompleteSegments { expected: u32, found: u32 },

    #[error("Video is not in a processable state: {0}")]
    InvalidState(String),

    #[error("Pipeline panicked: {0}")]
    Panicked(String),

    #[error("Provider error: {0}")]
    Provider(#[from] vidgen_providers::ProviderError),

    #[error("Media error: {0}")]
    Media(#[from] vidgen_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] vidgen_storage::StorageError),

    #[error("Store error: {0}")]
    Store(#[from] vidgen_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn segment_failed(segment: u32, reason: impl Into<String>) -> Self {
        Self::SegmentFailed {
            segment,
            reason: reason.into(),
        }
    }

    /// Whether the retry policy should attempt again.
    ///
    /// Typed provider classification first; segment timeouts are retryable
    /// by definition, toolchain and store failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Provider(e) => e.is_retryable(),
            WorkerError::SegmentTimeout { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidgen_providers::ProviderError;

    #[test]
    fn test_retryability_dispatch() {
        assert!(WorkerError::Provider(ProviderError::RateLimited).is_retryable());
        assert!(WorkerError::SegmentTimeout { segment: 2 }.is_retryable());
        assert!(!WorkerError::Cancelled.is_retryable());
        assert!(!WorkerError::Provider(ProviderError::Auth("bad key".into())).is_retryable());
    }
}
