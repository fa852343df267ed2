//! Document store over a directory of JSON files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// One JSON file per document, one subdirectory per collection.
///
/// Writes go through a temp file and rename, so concurrent readers (the API
/// polling status while the worker advances a run) always see a complete
/// document. The `write_lock` serializes read-modify-write sequences; plain
/// reads do not take it.
#[derive(Clone)]
pub struct JsonStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonStore {
    /// Open (and create) the store under `root`.
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Guard for compound check-then-write sequences (lock CAS, counters).
    pub(crate) async fn critical_section(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    fn doc_path(&self, collection: &str, id: &str) -> StoreResult<PathBuf> {
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(collection).join(format!("{id}.json")))
    }

    /// Read a document, `None` when absent.
    pub async fn read<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> StoreResult<Option<T>> {
        let path = self.doc_path(collection, id)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Write a document atomically.
    pub async fn write<T: Serialize>(&self, collection: &str, id: &str, value: &T) -> StoreResult<()> {
        let path = self.doc_path(collection, id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &path).await?;

        debug!(collection, id, "Wrote document");
        Ok(())
    }

    /// Delete a document. Returns whether it existed.
    pub async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let path = self.doc_path(collection, id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// IDs of every document in a collection, unsorted.
    pub async fn list_ids(&self, collection: &str) -> StoreResult<Vec<String>> {
        let dir = self.root.join(collection);
        let mut ids = Vec::new();

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();

        let doc = Doc {
            name: "eagle".to_string(),
            count: 3,
        };
        store.write("videos", "v1", &doc).await.unwrap();

        let loaded: Option<Doc> = store.read("videos", "v1").await.unwrap();
        assert_eq!(loaded, Some(doc));
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();

        let loaded: Option<Doc> = store.read("videos", "nope").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();

        let doc = Doc {
            name: "x".to_string(),
            count: 0,
        };
        store.write("videos", "v1", &doc).await.unwrap();
        assert!(store.delete("videos", "v1").await.unwrap());
        assert!(!store.delete("videos", "v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_traversal_ids() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();

        let result: StoreResult<Option<Doc>> = store.read("videos", "../escape").await;
        assert!(matches!(result, Err(StoreError::InvalidId(_))));
    }

    #[tokio::test]
    async fn test_list_ids() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();

        let doc = Doc {
            name: "x".to_string(),
            count: 0,
        };
        store.write("videos", "a", &doc).await.unwrap();
        store.write("videos", "b", &doc).await.unwrap();

        let mut ids = store.list_ids("videos").await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(store.list_ids("empty").await.unwrap().is_empty());
    }
}
