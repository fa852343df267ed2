//! Processing lock record.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::video::VideoId;

/// Context attached to a held lock, surfaced by the system status endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LockMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}

/// Mutual-exclusion record gating the whole orchestrator.
///
/// At most one record per key may be locked and unexpired at a time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingLock {
    pub key: String,
    pub is_locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: LockMetadata,
}

impl ProcessingLock {
    /// An unlocked record for the given key.
    pub fn unlocked(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_locked: false,
            locked_by: None,
            locked_at: None,
            expires_at: None,
            metadata: LockMetadata::default(),
        }
    }

    /// A record held by `owner` until `now + timeout`.
    pub fn held_by(
        key: impl Into<String>,
        owner: impl Into<String>,
        metadata: LockMetadata,
        timeout: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            is_locked: true,
            locked_by: Some(owner.into()),
            locked_at: Some(now),
            expires_at: Some(now + timeout),
            metadata,
        }
    }

    /// True when the lock was held but its expiry has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_locked && self.expires_at.map(|e| e < now).unwrap_or(true)
    }

    /// True when the lock is held and still valid.
    pub fn is_held(&self, now: DateTime<Utc>) -> bool {
        self.is_locked && !self.is_expired(now)
    }

    /// Clear all holder state.
    pub fn clear(&mut self) {
        self.is_locked = false;
        self.locked_by = None;
        self.locked_at = None;
        self.expires_at = None;
        self.metadata = LockMetadata::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_lock_is_not_held() {
        let mut lock = ProcessingLock::held_by(
            "processing",
            "worker-1",
            LockMetadata::default(),
            Duration::minutes(30),
        );
        assert!(lock.is_held(Utc::now()));

        lock.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert!(lock.is_expired(Utc::now()));
        assert!(!lock.is_held(Utc::now()));
    }

    #[test]
    fn test_clear_resets_holder() {
        let mut lock = ProcessingLock::held_by(
            "processing",
            "worker-1",
            LockMetadata::default(),
            Duration::minutes(30),
        );
        lock.clear();
        assert!(!lock.is_locked);
        assert!(lock.locked_by.is_none());
        assert!(lock.expires_at.is_none());
    }
}
