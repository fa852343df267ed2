//! Processing lock repository.
//!
//! The acquire path is a compare-and-set: the expiry check and the write
//! happen inside the store's critical section, so two concurrent acquirers
//! can never both observe "free" and both write.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use vidgen_models::{LockMetadata, ProcessingLock};

use crate::client::JsonStore;
use crate::error::StoreResult;

const COLLECTION: &str = "locks";

/// The one lock key the orchestrator uses.
pub const PROCESSING_LOCK_KEY: &str = "video_processing";

/// Acquire/release/extend/sweep over persisted [`ProcessingLock`] rows.
#[derive(Clone)]
pub struct LockRepository {
    store: JsonStore,
}

impl LockRepository {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    /// Try to take the lock. Returns the held row, or `None` on contention.
    /// A row that is absent, unlocked, or expired is acquirable; acquiring
    /// never blocks on the current holder.
    pub async fn acquire(
        &self,
        key: &str,
        owner: &str,
        metadata: LockMetadata,
        timeout: Duration,
    ) -> StoreResult<Option<ProcessingLock>> {
        let guard = self.store.critical_section().await;

        let now = Utc::now();
        let current: Option<ProcessingLock> = self.store.read(COLLECTION, key).await?;

        if let Some(current) = &current {
            if current.is_held(now) {
                debug!(key, held_by = ?current.locked_by, "Lock contention");
                return Ok(None);
            }
            if current.is_expired(now) {
                warn!(key, held_by = ?current.locked_by, "Stealing expired lock");
            }
        }

        let lock = ProcessingLock::held_by(key, owner, metadata, timeout);
        self.store.write(COLLECTION, key, &lock).await?;
        drop(guard);

        info!(key, owner, "Acquired processing lock");
        Ok(Some(lock))
    }

    /// Unconditional clear by key. Returns whether a held row was cleared.
    pub async fn release(&self, key: &str) -> StoreResult<bool> {
        let guard = self.store.critical_section().await;

        let current: Option<ProcessingLock> = self.store.read(COLLECTION, key).await?;
        let was_held = current.as_ref().map(|l| l.is_locked).unwrap_or(false);

        let mut lock = current.unwrap_or_else(|| ProcessingLock::unlocked(key));
        lock.clear();
        self.store.write(COLLECTION, key, &lock).await?;
        drop(guard);

        if was_held {
            info!(key, "Released processing lock");
        }
        Ok(was_held)
    }

    /// Push the expiry forward if the lock is currently held.
    pub async fn extend(&self, key: &str, delta: Duration) -> StoreResult<bool> {
        let guard = self.store.critical_section().await;

        let now = Utc::now();
        let Some(mut lock) = self.store.read::<ProcessingLock>(COLLECTION, key).await? else {
            return Ok(false);
        };
        if !lock.is_held(now) {
            return Ok(false);
        }

        lock.expires_at = lock.expires_at.map(|e| e + delta);
        self.store.write(COLLECTION, key, &lock).await?;
        drop(guard);

        debug!(key, "Extended processing lock");
        Ok(true)
    }

    /// Current row, lazily expiring: a held-but-expired row is cleared
    /// before being returned.
    pub async fn status(&self, key: &str) -> StoreResult<ProcessingLock> {
        let guard = self.store.critical_section().await;

        let now = Utc::now();
        let mut lock: ProcessingLock = self
            .store
            .read(COLLECTION, key)
            .await?
            .unwrap_or_else(|| ProcessingLock::unlocked(key));

        if lock.is_expired(now) {
            warn!(key, "Clearing expired lock on status read");
            lock.clear();
            self.store.write(COLLECTION, key, &lock).await?;
        }
        drop(guard);

        Ok(lock)
    }

    /// Clear every expired row. Returns how many were cleared.
    pub async fn sweep(&self) -> StoreResult<u32> {
        let guard = self.store.critical_section().await;

        let now = Utc::now();
        let mut cleared = 0u32;
        for key in self.store.list_ids(COLLECTION).await? {
            let Some(mut lock) = self.store.read::<ProcessingLock>(COLLECTION, &key).await? else {
                continue;
            };
            if lock.is_expired(now) {
                lock.clear();
                self.store.write(COLLECTION, &key, &lock).await?;
                cleared += 1;
            }
        }
        drop(guard);

        if cleared > 0 {
            info!(cleared, "Swept expired locks");
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn repo() -> (TempDir, LockRepository) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();
        (dir, LockRepository::new(store))
    }

    #[tokio::test]
    async fn test_acquire_contention_and_release() {
        let (_dir, locks) = repo().await;

        let first = locks
            .acquire(PROCESSING_LOCK_KEY, "worker-1", LockMetadata::default(), Duration::minutes(30))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = locks
            .acquire(PROCESSING_LOCK_KEY, "worker-2", LockMetadata::default(), Duration::minutes(30))
            .await
            .unwrap();
        assert!(second.is_none());

        assert!(locks.release(PROCESSING_LOCK_KEY).await.unwrap());

        let third = locks
            .acquire(PROCESSING_LOCK_KEY, "worker-2", LockMetadata::default(), Duration::minutes(30))
            .await
            .unwrap();
        assert!(third.is_some());
    }

    #[tokio::test]
    async fn test_expired_lock_is_acquirable_by_other_owner() {
        let (_dir, locks) = repo().await;

        locks
            .acquire(PROCESSING_LOCK_KEY, "worker-1", LockMetadata::default(), Duration::seconds(-1))
            .await
            .unwrap();

        let stolen = locks
            .acquire(PROCESSING_LOCK_KEY, "worker-2", LockMetadata::default(), Duration::minutes(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stolen.locked_by.as_deref(), Some("worker-2"));
    }

    #[tokio::test]
    async fn test_status_lazily_expires() {
        let (_dir, locks) = repo().await;

        locks
            .acquire(PROCESSING_LOCK_KEY, "worker-1", LockMetadata::default(), Duration::seconds(-1))
            .await
            .unwrap();

        let status = locks.status(PROCESSING_LOCK_KEY).await.unwrap();
        assert!(!status.is_locked);
    }

    #[tokio::test]
    async fn test_extend_requires_held_lock() {
        let (_dir, locks) = repo().await;
        assert!(!locks.extend(PROCESSING_LOCK_KEY, Duration::minutes(5)).await.unwrap());

        locks
            .acquire(PROCESSING_LOCK_KEY, "worker-1", LockMetadata::default(), Duration::minutes(30))
            .await
            .unwrap();
        assert!(locks.extend(PROCESSING_LOCK_KEY, Duration::minutes(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_clears_expired_rows() {
        let (_dir, locks) = repo().await;

        locks
            .acquire("a", "w", LockMetadata::default(), Duration::seconds(-1))
            .await
            .unwrap();
        locks
            .acquire("b", "w", LockMetadata::default(), Duration::minutes(30))
            .await
            .unwrap();

        assert_eq!(locks.sweep().await.unwrap(), 1);
        assert!(locks.status("b").await.unwrap().is_locked);
    }
}
