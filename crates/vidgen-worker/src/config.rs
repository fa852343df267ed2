//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vidgen_models::timing;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Validation lower bound for target duration, seconds
    pub min_video_duration: u32,
    /// Validation upper bound for target duration, seconds
    pub max_video_duration: u32,
    /// Nominal segment length, seconds
    pub segment_duration: u32,
    /// Per-segment retry cap
    pub max_segment_retries: u32,
    /// Upper bound on parallel generation jobs (batch mode only)
    pub max_concurrent_jobs: usize,
    /// Generator poll cadence
    pub polling_interval: Duration,
    /// Whole-run wall clock bound
    pub video_timeout: Duration,
    /// Per-segment wall clock bound
    pub segment_timeout: Duration,
    /// Processing lock expiry
    pub lock_timeout: Duration,
    /// Storage root
    pub upload_dir: PathBuf,
    /// Public URL base for served artifacts
    pub public_base_url: String,
    /// Segment cache entry TTL
    pub cache_ttl: Duration,
    /// Cache key truncation, hex chars
    pub cache_hash_length: usize,
    /// Default narration voice
    pub default_voice_id: String,
    pub default_voice_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            min_video_duration: timing::MIN_VIDEO_DURATION,
            max_video_duration: timing::MAX_VIDEO_DURATION,
            segment_duration: timing::DEFAULT_SEGMENT_DURATION,
            max_segment_retries: 3,
            max_concurrent_jobs: 1,
            polling_interval: Duration::from_millis(10_000),
            video_timeout: Duration::from_millis(1_800_000),
            segment_timeout: Duration::from_millis(900_000),
            lock_timeout: Duration::from_millis(1_800_000),
            upload_dir: PathBuf::from("./uploads"),
            public_base_url: "http://localhost:3000/api/files".to_string(),
            cache_ttl: Duration::from_secs(168 * 3600),
            cache_hash_length: 32,
            default_voice_id: "narrator-en-1".to_string(),
            default_voice_name: "Narrator".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_video_duration: env_parse("MIN_VIDEO_DURATION", defaults.min_video_duration),
            max_video_duration: env_parse("MAX_VIDEO_DURATION", defaults.max_video_duration),
            segment_duration: env_parse("SEGMENT_DURATION", defaults.segment_duration),
            max_segment_retries: env_parse("MAX_SEGMENT_RETRIES", defaults.max_segment_retries),
            max_concurrent_jobs: env_parse("MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs),
            polling_interval: Duration::from_millis(env_parse("POLLING_INTERVAL_MS", 10_000)),
            video_timeout: Duration::from_millis(env_parse("VIDEO_TIMEOUT_MS", 1_800_000)),
            segment_timeout: Duration::from_millis(env_parse("SEGMENT_TIMEOUT_MS", 900_000)),
            lock_timeout: Duration::from_millis(env_parse("LOCK_TIMEOUT_MS", 1_800_000)),
            upload_dir: PathBuf::from(
                std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            ),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| defaults.public_base_url.clone()),
            cache_ttl: Duration::from_secs(env_parse("CACHE_TTL_HOURS", 168u64) * 3600),
            cache_hash_length: env_parse("CACHE_HASH_LENGTH", defaults.cache_hash_length),
            default_voice_id: std::env::var("TTS_VOICE_ID")
                .unwrap_or_else(|_| defaults.default_voice_id.clone()),
            default_voice_name: std::env::var("TTS_VOICE_NAME")
                .unwrap_or_else(|_| defaults.default_voice_name.clone()),
        }
    }

    /// Validate a requested duration against the configured bounds.
    pub fn duration_in_bounds(&self, duration: u32) -> bool {
        duration >= self.min_video_duration && duration <= self.max_video_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_segment_retries, 3);
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.polling_interval, Duration::from_secs(10));
        assert_eq!(config.segment_timeout, Duration::from_secs(900));
        assert_eq!(config.lock_timeout, Duration::from_secs(1800));
        assert_eq!(config.cache_hash_length, 32);
    }

    #[test]
    fn test_duration_bounds() {
        let config = WorkerConfig::default();
        assert!(config.duration_in_bounds(5));
        assert!(config.duration_in_bounds(120));
        assert!(!config.duration_in_bounds(4));
        assert!(!config.duration_in_bounds(121));
    }
}
