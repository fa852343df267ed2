//! Path derivation and tree management.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};

use vidgen_models::{ArtifactInfo, VideoId};

/// Rough bytes/second of a 1080p H.264 segment, used for disk estimation.
const SEGMENT_BYTES_PER_SEC: u64 = 1_500_000;

/// Rough bytes/second of the 720p master and merged outputs.
const OUTPUT_BYTES_PER_SEC: u64 = 900_000;

/// Rough bytes/second of 192 kbps mp3 narration.
const AUDIO_BYTES_PER_SEC: u64 = 24_000;

/// Aggregate usage under the storage root.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    pub total_files: u64,
    pub total_bytes: u64,
}

/// Derives every on-disk location from the storage root, plus the public
/// URL for anything under it.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    public_base_url: String,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // === per-video tree ===

    pub fn video_dir(&self, user_id: &str, video_id: &VideoId) -> PathBuf {
        self.root
            .join("videos")
            .join(user_id)
            .join(video_id.as_str())
    }

    pub fn segments_dir(&self, user_id: &str, video_id: &VideoId) -> PathBuf {
        self.video_dir(user_id, video_id).join("segments")
    }

    pub fn frames_dir(&self, user_id: &str, video_id: &VideoId) -> PathBuf {
        self.video_dir(user_id, video_id).join("frames")
    }

    /// `segments/segment_NNN.mp4`, zero-padded to 3.
    pub fn segment_path(&self, user_id: &str, video_id: &VideoId, segment_number: u32) -> PathBuf {
        self.segments_dir(user_id, video_id)
            .join(format!("segment_{:03}.mp4", segment_number))
    }

    /// `frames/frame_NNN.jpg`, zero-padded to 3.
    pub fn frame_path(&self, user_id: &str, video_id: &VideoId, segment_number: u32) -> PathBuf {
        self.frames_dir(user_id, video_id)
            .join(format!("frame_{:03}.jpg", segment_number))
    }

    pub fn stitched_path(&self, user_id: &str, video_id: &VideoId) -> PathBuf {
        self.video_dir(user_id, video_id).join("stitched_720p.mp4")
    }

    pub fn final_720p_path(&self, user_id: &str, video_id: &VideoId) -> PathBuf {
        self.video_dir(user_id, video_id).join("final_720p.mp4")
    }

    pub fn final_480p_path(&self, user_id: &str, video_id: &VideoId) -> PathBuf {
        self.video_dir(user_id, video_id).join("final_480p.mp4")
    }

    pub fn audio_path(&self, user_id: &str, video_id: &VideoId) -> PathBuf {
        self.video_dir(user_id, video_id).join("audio.mp3")
    }

    pub fn thumbnail_path(&self, user_id: &str, video_id: &VideoId) -> PathBuf {
        self.video_dir(user_id, video_id).join("thumbnail.jpg")
    }

    // === shared trees ===

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache").join("segments")
    }

    pub fn cache_segment_path(&self, hash: &str) -> PathBuf {
        self.cache_dir().join(format!("{hash}.mp4"))
    }

    pub fn cache_manifest_path(&self) -> PathBuf {
        self.cache_dir().join("manifest.json")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp").join("processing")
    }

    pub fn db_dir(&self) -> PathBuf {
        self.root.join("db")
    }

    // === tree operations ===

    /// Create the full per-video tree.
    pub async fn ensure_video_tree(&self, user_id: &str, video_id: &VideoId) -> std::io::Result<()> {
        fs::create_dir_all(self.segments_dir(user_id, video_id)).await?;
        fs::create_dir_all(self.frames_dir(user_id, video_id)).await?;
        debug!(user_id, video_id = %video_id, "Created video tree");
        Ok(())
    }

    /// Remove everything a video owns. Missing tree is not an error.
    pub async fn delete_video_tree(&self, user_id: &str, video_id: &VideoId) -> std::io::Result<()> {
        let dir = self.video_dir(user_id, video_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(user_id, video_id = %video_id, "Deleted video tree");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Existing `segment_*.mp4` files, sorted ascending by name (the
    /// zero-padding makes lexicographic order numeric order).
    pub async fn list_segment_files(
        &self,
        user_id: &str,
        video_id: &VideoId,
    ) -> std::io::Result<Vec<PathBuf>> {
        let dir = self.segments_dir(user_id, video_id);
        let mut paths = Vec::new();

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("segment_") && name.ends_with(".mp4") {
                paths.push(entry.path());
            }
        }

        paths.sort();
        Ok(paths)
    }

    pub async fn file_size(&self, path: &Path) -> Option<u64> {
        fs::metadata(path).await.ok().map(|m| m.len())
    }

    pub async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok()
    }

    /// Public URL for a path under the root.
    pub fn public_url(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Some(format!("{}/{}", self.public_base_url, rel))
    }

    /// Size, format and URL of a finished artifact.
    pub async fn describe_artifact(
        &self,
        path: &Path,
        duration: Option<f64>,
    ) -> std::io::Result<ArtifactInfo> {
        let size = fs::metadata(path).await?.len();
        let format = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(ArtifactInfo {
            path: path.to_path_buf(),
            url: self.public_url(path).unwrap_or_default(),
            size,
            format,
            duration,
        })
    }

    /// Upper-bound disk estimate for one run: all 1080p segments, the 720p
    /// master, two finals, narration, plus 20% slack for temp files.
    pub fn estimate_required_bytes(&self, target_duration: u32) -> u64 {
        let d = target_duration as u64;
        let segments = d * SEGMENT_BYTES_PER_SEC;
        let outputs = 3 * d * OUTPUT_BYTES_PER_SEC;
        let audio = d * AUDIO_BYTES_PER_SEC;
        (segments + outputs + audio) * 12 / 10
    }

    /// Walk the whole root, counting files and bytes.
    pub async fn stats(&self) -> std::io::Result<StorageStats> {
        let mut stats = StorageStats::default();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    stack.push(entry.path());
                } else {
                    stats.total_files += 1;
                    stats.total_bytes += meta.len();
                }
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout(root: &Path) -> StorageLayout {
        StorageLayout::new(root, "http://localhost:3000/files/")
    }

    #[test]
    fn test_segment_paths_are_zero_padded() {
        let layout = layout(Path::new("/data"));
        let id = VideoId::from_string("vid-1");
        let path = layout.segment_path("user1", &id, 7);
        assert!(path.ends_with("videos/user1/vid-1/segments/segment_007.mp4"));
        let frame = layout.frame_path("user1", &id, 12);
        assert!(frame.ends_with("videos/user1/vid-1/frames/frame_012.jpg"));
    }

    #[test]
    fn test_public_url_strips_root() {
        let layout = layout(Path::new("/data"));
        let id = VideoId::from_string("vid-1");
        let url = layout.public_url(&layout.final_720p_path("user1", &id)).unwrap();
        assert_eq!(
            url,
            "http://localhost:3000/files/videos/user1/vid-1/final_720p.mp4"
        );
        assert!(layout.public_url(Path::new("/elsewhere/file.mp4")).is_none());
    }

    #[tokio::test]
    async fn test_list_segment_files_sorted() {
        let dir = TempDir::new().unwrap();
        let layout = layout(dir.path());
        let id = VideoId::from_string("vid-1");
        layout.ensure_video_tree("user1", &id).await.unwrap();

        for n in [3u32, 1, 2] {
            fs::write(layout.segment_path("user1", &id, n), b"clip")
                .await
                .unwrap();
        }
        fs::write(
            layout.segments_dir("user1", &id).join("stray.txt"),
            b"ignore me",
        )
        .await
        .unwrap();

        let files = layout.list_segment_files("user1", &id).await.unwrap();
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("segment_001.mp4"));
        assert!(files[2].ends_with("segment_003.mp4"));
    }

    #[tokio::test]
    async fn test_delete_video_tree_removes_everything() {
        let dir = TempDir::new().unwrap();
        let layout = layout(dir.path());
        let id = VideoId::from_string("vid-1");
        layout.ensure_video_tree("user1", &id).await.unwrap();
        fs::write(layout.segment_path("user1", &id, 1), b"clip")
            .await
            .unwrap();

        layout.delete_video_tree("user1", &id).await.unwrap();
        assert!(!layout.video_dir("user1", &id).exists());

        // Deleting again is fine
        layout.delete_video_tree("user1", &id).await.unwrap();
    }

    #[tokio::test]
    async fn test_stats_counts_files() {
        let dir = TempDir::new().unwrap();
        let layout = layout(dir.path());
        let id = VideoId::from_string("vid-1");
        layout.ensure_video_tree("user1", &id).await.unwrap();
        fs::write(layout.segment_path("user1", &id, 1), b"12345")
            .await
            .unwrap();

        let stats = layout.stats().await.unwrap();
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.total_bytes, 5);
    }

    #[test]
    fn test_estimate_scales_with_duration() {
        let layout = layout(Path::new("/data"));
        assert!(layout.estimate_required_bytes(120) > layout.estimate_required_bytes(60));
    }
}
