//! Provider error types and transient/fatal classification.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors from the storyboard, segment and narration providers.
///
/// The retry policy dispatches on these variants; string matching against
/// the message is only a fallback for opaque provider payloads.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider rate limited")]
    RateLimited,

    #[error("Provider unavailable (HTTP {status})")]
    Unavailable { status: u16 },

    #[error("Provider request timed out")]
    Timeout,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Quota exhausted: {0}")]
    Quota(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Generation job failed: {0}")]
    JobFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Map an HTTP error status to a typed error.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            429 => ProviderError::RateLimited,
            502 | 503 | 504 => ProviderError::Unavailable { status },
            401 | 403 => ProviderError::Auth(body.into()),
            402 => ProviderError::Quota(body.into()),
            _ => ProviderError::InvalidResponse(format!("HTTP {}: {}", status, body.into())),
        }
    }

    /// Whether a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited
            | ProviderError::Unavailable { .. }
            | ProviderError::Timeout => true,
            ProviderError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ProviderError::Auth(_) | ProviderError::Quota(_) | ProviderError::Config(_) => false,
            ProviderError::JobFailed(msg) | ProviderError::InvalidResponse(msg) => {
                message_is_transient(msg)
            }
        }
    }
}

/// Fallback heuristic for opaque provider messages.
pub fn message_is_transient(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    [
        "timeout",
        "timed out",
        "connection reset",
        "econnreset",
        "etimedout",
        "dns",
        "rate limit",
        "too many requests",
        "502",
        "503",
        "504",
    ]
    .iter()
    .any(|needle| msg.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status(429, ""),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            ProviderError::from_status(503, ""),
            ProviderError::Unavailable { status: 503 }
        ));
        assert!(matches!(
            ProviderError::from_status(401, "bad key"),
            ProviderError::Auth(_)
        ));
    }

    #[test]
    fn test_retryability() {
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(ProviderError::Unavailable { status: 502 }.is_retryable());
        assert!(ProviderError::Timeout.is_retryable());
        assert!(!ProviderError::Auth("invalid key".into()).is_retryable());
        assert!(!ProviderError::Quota("out of credits".into()).is_retryable());
    }

    #[test]
    fn test_opaque_message_heuristic() {
        assert!(ProviderError::JobFailed("upstream timeout while rendering".into()).is_retryable());
        assert!(!ProviderError::JobFailed("prompt rejected by safety filter".into()).is_retryable());
        assert!(message_is_transient("Connection reset by peer"));
        assert!(!message_is_transient("invalid prompt"));
    }
}
