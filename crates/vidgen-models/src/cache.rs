//! Segment cache manifest types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Provenance of a cached segment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntryMetadata {
    pub scene_prompt: String,
    pub segment_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// One content-addressed cached segment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheEntry {
    /// Truncated SHA-256 of prompt + segment number
    pub hash: String,
    /// Cached file under the cache tree
    pub file_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub metadata: CacheEntryMetadata,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// The single JSON document persisting the cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheManifest {
    #[serde(default)]
    pub entries: HashMap<String, CacheEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cleanup: Option<DateTime<Utc>>,
}

/// Aggregate cache statistics for the system status endpoint.
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_entry_expiry() {
        let now = Utc::now();
        let entry = CacheEntry {
            hash: "abc123".to_string(),
            file_path: PathBuf::from("/cache/segments/abc123.mp4"),
            created_at: now - Duration::days(8),
            expires_at: now - Duration::days(1),
            metadata: CacheEntryMetadata {
                scene_prompt: "prompt".to_string(),
                segment_number: 1,
                duration: Some(12.0),
            },
        };
        assert!(entry.is_expired(now));
        assert!(!entry.is_expired(now - Duration::days(2)));
    }

    #[test]
    fn test_manifest_roundtrip() {
        let mut manifest = CacheManifest::default();
        manifest.entries.insert(
            "deadbeef".to_string(),
            CacheEntry {
                hash: "deadbeef".to_string(),
                file_path: PathBuf::from("/cache/segments/deadbeef.mp4"),
                created_at: Utc::now(),
                expires_at: Utc::now() + Duration::days(7),
                metadata: CacheEntryMetadata {
                    scene_prompt: "an eagle".to_string(),
                    segment_number: 2,
                    duration: None,
                },
            },
        );

        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: CacheManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries["deadbeef"].metadata.segment_number, 2);
    }
}
