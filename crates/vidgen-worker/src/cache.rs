//! Content-addressed segment cache.
//!
//! Keyed by a truncated SHA-256 of scene prompt + segment index. The cache
//! is advisory: a missing file, a corrupt manifest or an expired entry all
//! self-heal by falling back to regeneration. The manifest is one JSON
//! document, rewritten atomically after every mutating operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vidgen_models::{CacheEntry, CacheEntryMetadata, CacheManifest, CacheStats};
use vidgen_storage::StorageLayout;

use crate::error::WorkerResult;

/// Cleanup runs at most this often.
const CLEANUP_MIN_INTERVAL_HOURS: i64 = 24;

/// Content-addressed file cache for generated segments.
#[derive(Clone)]
pub struct SegmentCache {
    layout: StorageLayout,
    ttl: Duration,
    hash_length: usize,
    manifest_lock: Arc<Mutex<()>>,
}

impl SegmentCache {
    pub fn new(layout: StorageLayout, ttl: std::time::Duration, hash_length: usize) -> Self {
        Self {
            layout,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(7)),
            hash_length,
            manifest_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Truncated SHA-256 of `scene_prompt ∥ segment_number`.
    pub fn hash_key(&self, scene_prompt: &str, segment_number: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(scene_prompt.as_bytes());
        hasher.update(segment_number.to_le_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..self.hash_length.min(digest.len())].to_string()
    }

    /// A missing or corrupt manifest reads as empty.
    async fn load_manifest(&self) -> CacheManifest {
        let path = self.layout.cache_manifest_path();
        match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!(error = %e, "Corrupt cache manifest, starting empty");
                    CacheManifest::default()
                }
            },
            Err(_) => CacheManifest::default(),
        }
    }

    async fn save_manifest(&self, manifest: &CacheManifest) -> WorkerResult<()> {
        let path = self.layout.cache_manifest_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(manifest).map_err(std::io::Error::other)?)
            .await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Path of a cached, unexpired segment whose file is present. Any
    /// broken entry is removed on the way out.
    pub async fn lookup(&self, scene_prompt: &str, segment_number: u32) -> Option<PathBuf> {
        let hash = self.hash_key(scene_prompt, segment_number);
        let guard = self.manifest_lock.lock().await;

        let mut manifest = self.load_manifest().await;
        let (path, expired) = match manifest.entries.get(&hash) {
            Some(entry) => (entry.file_path.clone(), entry.is_expired(Utc::now())),
            None => return None,
        };

        let file_ok = fs::metadata(&path)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false);

        if expired || !file_ok {
            debug!(hash, "Removing stale cache entry");
            manifest.entries.remove(&hash);
            let _ = fs::remove_file(&path).await;
            if let Err(e) = self.save_manifest(&manifest).await {
                warn!(error = %e, "Failed to persist cache manifest after self-heal");
            }
            return None;
        }

        drop(guard);
        debug!(hash, segment_number, "Segment cache hit");
        Some(path)
    }

    /// Copy a generated segment into the cache and record it.
    pub async fn store(
        &self,
        scene_prompt: &str,
        segment_number: u32,
        source_path: &Path,
        duration: Option<f64>,
    ) -> WorkerResult<PathBuf> {
        let hash = self.hash_key(scene_prompt, segment_number);
        let cached_path = self.layout.cache_segment_path(&hash);

        let guard = self.manifest_lock.lock().await;

        if let Some(parent) = cached_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(source_path, &cached_path).await?;

        let now = Utc::now();
        let mut manifest = self.load_manifest().await;
        manifest.entries.insert(
            hash.clone(),
            CacheEntry {
                hash: hash.clone(),
                file_path: cached_path.clone(),
                created_at: now,
                expires_at: now + self.ttl,
                metadata: CacheEntryMetadata {
                    scene_prompt: scene_prompt.to_string(),
                    segment_number,
                    duration,
                },
            },
        );
        self.save_manifest(&manifest).await?;
        drop(guard);

        info!(hash, segment_number, "Stored segment in cache");
        Ok(cached_path)
    }

    /// Copy a cached segment to `target_path`. Returns whether it was a hit.
    pub async fn copy_to(
        &self,
        scene_prompt: &str,
        segment_number: u32,
        target_path: &Path,
    ) -> WorkerResult<bool> {
        let Some(cached) = self.lookup(scene_prompt, segment_number).await else {
            return Ok(false);
        };

        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&cached, target_path).await?;
        Ok(true)
    }

    /// Purge expired entries. Rate-limited to once per 24h; returns how
    /// many entries were removed.
    pub async fn cleanup(&self) -> WorkerResult<u32> {
        let guard = self.manifest_lock.lock().await;

        let now = Utc::now();
        let mut manifest = self.load_manifest().await;

        if let Some(last) = manifest.last_cleanup {
            if now - last < Duration::hours(CLEANUP_MIN_INTERVAL_HOURS) {
                return Ok(0);
            }
        }

        let expired: Vec<String> = manifest
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(hash, _)| hash.clone())
            .collect();

        for hash in &expired {
            if let Some(entry) = manifest.entries.remove(hash) {
                let _ = fs::remove_file(&entry.file_path).await;
            }
        }

        manifest.last_cleanup = Some(now);
        self.save_manifest(&manifest).await?;
        drop(guard);

        let removed = expired.len() as u32;
        if removed > 0 {
            info!(removed, "Cleaned up expired cache entries");
        }
        Ok(removed)
    }

    /// Entry count, total bytes, oldest/newest entry timestamps.
    pub async fn stats(&self) -> CacheStats {
        let manifest = self.load_manifest().await;

        let mut total_bytes = 0u64;
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;

        for entry in manifest.entries.values() {
            if let Ok(meta) = fs::metadata(&entry.file_path).await {
                total_bytes += meta.len();
            }
            oldest = Some(oldest.map_or(entry.created_at, |o| o.min(entry.created_at)));
            newest = Some(newest.map_or(entry.created_at, |n| n.max(entry.created_at)));
        }

        CacheStats {
            entry_count: manifest.entries.len(),
            total_bytes,
            oldest_entry: oldest,
            newest_entry: newest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache(root: &Path) -> SegmentCache {
        let layout = StorageLayout::new(root, "http://localhost:3000/files");
        SegmentCache::new(layout, std::time::Duration::from_secs(7 * 24 * 3600), 32)
    }

    #[test]
    fn test_hash_key_is_stable_and_truncated() {
        let dir = TempDir::new().unwrap();
        let cache = cache(dir.path());

        let a = cache.hash_key("an eagle", 1);
        let b = cache.hash_key("an eagle", 1);
        let c = cache.hash_key("an eagle", 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let dir = TempDir::new().unwrap();
        let cache = cache(dir.path());

        let source = dir.path().join("segment.mp4");
        fs::write(&source, b"fake clip bytes").await.unwrap();

        cache.store("an eagle", 1, &source, Some(12.0)).await.unwrap();

        let hit = cache.lookup("an eagle", 1).await.unwrap();
        assert_eq!(fs::read(&hit).await.unwrap(), b"fake clip bytes");
        assert!(cache.lookup("an eagle", 2).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_self_heals() {
        let dir = TempDir::new().unwrap();
        let cache = cache(dir.path());

        let source = dir.path().join("segment.mp4");
        fs::write(&source, b"bytes").await.unwrap();
        let cached = cache.store("prompt", 1, &source, None).await.unwrap();

        fs::remove_file(&cached).await.unwrap();
        assert!(cache.lookup("prompt", 1).await.is_none());
        // entry is gone from the manifest now
        assert_eq!(cache.stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn test_corrupt_manifest_reads_empty() {
        let dir = TempDir::new().unwrap();
        let cache = cache(dir.path());

        let manifest_path = cache.layout.cache_manifest_path();
        fs::create_dir_all(manifest_path.parent().unwrap())
            .await
            .unwrap();
        fs::write(&manifest_path, b"{not json").await.unwrap();

        assert!(cache.lookup("prompt", 1).await.is_none());
        assert_eq!(cache.stats().await.entry_count, 0);
    }

    #[tokio::test]
    async fn test_copy_to_reports_hit_and_miss() {
        let dir = TempDir::new().unwrap();
        let cache = cache(dir.path());

        let source = dir.path().join("segment.mp4");
        fs::write(&source, b"bytes").await.unwrap();
        cache.store("prompt", 1, &source, None).await.unwrap();

        let target = dir.path().join("videos").join("segment_001.mp4");
        assert!(cache.copy_to("prompt", 1, &target).await.unwrap());
        assert!(target.exists());
        assert!(!cache.copy_to("other prompt", 1, &target).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_is_rate_limited() {
        let dir = TempDir::new().unwrap();
        let cache = cache(dir.path());

        let source = dir.path().join("segment.mp4");
        fs::write(&source, b"bytes").await.unwrap();
        cache.store("prompt", 1, &source, None).await.unwrap();

        // nothing expired yet; this stamps last_cleanup
        assert_eq!(cache.cleanup().await.unwrap(), 0);
        // second call within 24h is a no-op regardless of state
        assert_eq!(cache.cleanup().await.unwrap(), 0);

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 1);
        assert!(stats.total_bytes > 0);
    }
}
