//! Explicit service wiring.
//!
//! Everything the orchestrator touches is constructed here and threaded
//! through as one struct, so tests can swap the providers and the
//! toolchain for fakes.

use std::sync::Arc;

use uuid::Uuid;

use vidgen_media::MediaToolchain;
use vidgen_providers::{NarrationProvider, StoryboardProvider, VideoSegmentProvider};
use vidgen_storage::StorageLayout;
use vidgen_store::{JsonStore, LockRepository, VideoRepository};

use crate::cache::SegmentCache;
use crate::cancel::CancelRegistry;
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::recovery::RecoveryPlanner;
use crate::sync::SyncVerifier;

/// The orchestrator's collaborators.
pub struct Services {
    pub config: WorkerConfig,
    pub videos: VideoRepository,
    pub locks: LockRepository,
    pub layout: StorageLayout,
    pub toolchain: Arc<dyn MediaToolchain>,
    pub storyboard: Arc<dyn StoryboardProvider>,
    pub segments: Arc<dyn VideoSegmentProvider>,
    pub narration: Arc<dyn NarrationProvider>,
    pub cache: SegmentCache,
    pub sync: SyncVerifier,
    pub recovery: RecoveryPlanner,
    pub cancels: CancelRegistry,
    /// Lock owner identity for this process
    pub worker_id: String,
}

impl Services {
    /// Wire everything against the storage root in `config`.
    pub async fn new(
        config: WorkerConfig,
        toolchain: Arc<dyn MediaToolchain>,
        storyboard: Arc<dyn StoryboardProvider>,
        segments: Arc<dyn VideoSegmentProvider>,
        narration: Arc<dyn NarrationProvider>,
    ) -> WorkerResult<Arc<Self>> {
        let layout = StorageLayout::new(&config.upload_dir, &config.public_base_url);
        let store = JsonStore::open(layout.db_dir()).await?;
        let videos = VideoRepository::new(store.clone());
        let locks = LockRepository::new(store);
        let cache = SegmentCache::new(layout.clone(), config.cache_ttl, config.cache_hash_length);
        let sync = SyncVerifier::new(toolchain.clone());
        let recovery = RecoveryPlanner::new(videos.clone(), layout.clone());

        Ok(Arc::new(Self {
            config,
            videos,
            locks,
            layout,
            toolchain,
            storyboard,
            segments,
            narration,
            cache,
            sync,
            recovery,
            cancels: CancelRegistry::new(),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }))
    }
}
