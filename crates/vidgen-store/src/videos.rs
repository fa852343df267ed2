//! Video record repository.

use chrono::Utc;
use tracing::debug;

use vidgen_models::{VideoId, VideoRecord};

use crate::client::JsonStore;
use crate::error::{StoreError, StoreResult};

const COLLECTION: &str = "videos";

/// CRUD over persisted [`VideoRecord`]s.
#[derive(Clone)]
pub struct VideoRepository {
    store: JsonStore,
}

impl VideoRepository {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    /// Persist a new record; errors if the id is already taken.
    pub async fn create(&self, record: &VideoRecord) -> StoreResult<()> {
        let guard = self.store.critical_section().await;
        let existing: Option<VideoRecord> = self.store.read(COLLECTION, record.id.as_str()).await?;
        if existing.is_some() {
            return Err(StoreError::already_exists(COLLECTION, record.id.as_str()));
        }
        let result = self.store.write(COLLECTION, record.id.as_str(), record).await;
        drop(guard);
        result
    }

    pub async fn get(&self, id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        self.store.read(COLLECTION, id.as_str()).await
    }

    /// Overwrite the whole record.
    pub async fn save(&self, record: &VideoRecord) -> StoreResult<()> {
        self.store.write(COLLECTION, record.id.as_str(), record).await
    }

    /// Read-modify-write under the store's critical section, bumping
    /// `updated_at`. Returns the persisted record.
    pub async fn mutate<F>(&self, id: &VideoId, f: F) -> StoreResult<VideoRecord>
    where
        F: FnOnce(&mut VideoRecord),
    {
        let guard = self.store.critical_section().await;
        let mut record: VideoRecord = self
            .store
            .read(COLLECTION, id.as_str())
            .await?
            .ok_or_else(|| StoreError::not_found(COLLECTION, id.as_str()))?;

        f(&mut record);
        record.updated_at = Utc::now();

        self.store.write(COLLECTION, id.as_str(), &record).await?;
        drop(guard);

        debug!(video_id = %id, status = %record.status, "Updated video record");
        Ok(record)
    }

    pub async fn delete(&self, id: &VideoId) -> StoreResult<bool> {
        self.store.delete(COLLECTION, id.as_str()).await
    }

    /// All records, unsorted. The recovery sweep walks this.
    pub async fn list_all(&self) -> StoreResult<Vec<VideoRecord>> {
        let mut records = Vec::new();
        for id in self.store.list_ids(COLLECTION).await? {
            if let Some(record) = self.store.read(COLLECTION, &id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// A user's records, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> StoreResult<Vec<VideoRecord>> {
        let mut records: Vec<VideoRecord> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vidgen_models::VideoStatus;

    async fn repo() -> (TempDir, VideoRepository) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();
        (dir, VideoRepository::new(store))
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (_dir, repo) = repo().await;
        let record = VideoRecord::new("user1", "an eagle", 60);
        repo.create(&record).await.unwrap();

        let loaded = repo.get(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.segment_count, 5);
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let (_dir, repo) = repo().await;
        let record = VideoRecord::new("user1", "an eagle", 60);
        repo.create(&record).await.unwrap();
        assert!(matches!(
            repo.create(&record).await,
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_mutate_persists_and_bumps_updated_at() {
        let (_dir, repo) = repo().await;
        let record = VideoRecord::new("user1", "an eagle", 60);
        repo.create(&record).await.unwrap();

        let updated = repo
            .mutate(&record.id, |r| r.fail("provider quota exhausted"))
            .await
            .unwrap();
        assert_eq!(updated.status, VideoStatus::Failed);
        assert!(updated.updated_at >= record.updated_at);

        let loaded = repo.get(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, VideoStatus::Failed);
    }

    #[tokio::test]
    async fn test_list_by_user_filters_and_orders() {
        let (_dir, repo) = repo().await;
        let a = VideoRecord::new("user1", "first", 60);
        let b = VideoRecord::new("user2", "other user", 60);
        let c = VideoRecord::new("user1", "second", 60);
        for record in [&a, &b, &c] {
            repo.create(record).await.unwrap();
        }

        let mine = repo.list_by_user("user1").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|r| r.user_id == "user1"));
    }
}
