//! Text-to-speech client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::NarrationProvider;
use crate::types::VoiceSettings;

/// Configuration for the TTS client.
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl TtsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            base_url: std::env::var("TTS_API_URL")
                .unwrap_or_else(|_| "https://api.elevenlabs.io".to_string()),
            api_key: std::env::var("TTS_API_KEY")
                .map_err(|_| ProviderError::Config("TTS_API_KEY not set".into()))?,
            model: std::env::var("TTS_MODEL").unwrap_or_else(|_| "eleven_turbo_v2".to_string()),
            timeout: Duration::from_secs(
                std::env::var("TTS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        })
    }
}

/// HTTP narration provider.
pub struct HttpNarrationProvider {
    http: Client,
    config: TtsConfig,
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

impl HttpNarrationProvider {
    pub fn new(config: TtsConfig) -> ProviderResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(TtsConfig::from_env()?)
    }
}

#[async_trait]
impl NarrationProvider for HttpNarrationProvider {
    async fn synthesize(
        &self,
        script: &str,
        voice_id: &str,
        settings: &VoiceSettings,
    ) -> ProviderResult<Vec<u8>> {
        let url = format!("{}/v1/text-to-speech/{}", self.config.base_url, voice_id);

        let response = self
            .http
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .json(&SynthesizeRequest {
                text: script,
                model_id: &self.config.model,
                voice_settings: settings,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::InvalidResponse("empty audio payload".into()));
        }

        info!(voice_id, bytes = bytes.len(), "Synthesized narration");
        Ok(bytes.to_vec())
    }
}
