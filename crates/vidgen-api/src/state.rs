//! Application state.

use std::sync::Arc;

use vidgen_media::FfmpegToolchain;
use vidgen_providers::{HttpNarrationProvider, HttpStoryboardProvider, HttpVideoSegmentProvider};
use vidgen_worker::{Orchestrator, Services, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub services: Arc<Services>,
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Wire the real providers and toolchain from the environment.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let worker_config = WorkerConfig::from_env();

        let services = Services::new(
            worker_config,
            Arc::new(FfmpegToolchain::new()),
            Arc::new(HttpStoryboardProvider::from_env()?),
            Arc::new(HttpVideoSegmentProvider::from_env()?),
            Arc::new(HttpNarrationProvider::from_env()?),
        )
        .await?;

        Ok(Self {
            config,
            orchestrator: Orchestrator::new(services.clone()),
            services,
        })
    }

    /// State over pre-built services, used by tests with fakes.
    pub fn with_services(config: ApiConfig, services: Arc<Services>) -> Self {
        Self {
            config,
            orchestrator: Orchestrator::new(services.clone()),
            services,
        }
    }
}
