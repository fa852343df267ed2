//! Text-to-video segment client.
//!
//! Job-based wire protocol: submit, poll, download. The continuity hint is
//! applied as a text annotation; the backing model is not assumed to accept
//! image conditioning.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::traits::VideoSegmentProvider;
use crate::types::{ContinuityHint, SegmentJobState, SegmentJobStatus};

/// Configuration for the segment generation client.
#[derive(Debug, Clone)]
pub struct SegmentApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl SegmentApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            base_url: std::env::var("SEGMENT_API_URL")
                .map_err(|_| ProviderError::Config("SEGMENT_API_URL not set".into()))?,
            api_key: std::env::var("SEGMENT_API_KEY")
                .map_err(|_| ProviderError::Config("SEGMENT_API_KEY not set".into()))?,
            model: std::env::var("SEGMENT_MODEL").unwrap_or_else(|_| "t2v-large".to_string()),
            timeout: Duration::from_secs(
                std::env::var("SEGMENT_API_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        })
    }
}

/// HTTP video segment provider.
pub struct HttpVideoSegmentProvider {
    http: Client,
    config: SegmentApiConfig,
}

#[derive(Debug, Serialize)]
struct StartJobRequest {
    model: String,
    prompt: String,
    width: u32,
    height: u32,
    n_seconds: u32,
}

#[derive(Debug, Deserialize)]
struct StartJobResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    status: String,
    #[serde(default)]
    generations: Vec<GenerationRef>,
    #[serde(default)]
    failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationRef {
    id: String,
}

impl HttpVideoSegmentProvider {
    pub fn new(config: SegmentApiConfig) -> ProviderResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(SegmentApiConfig::from_env()?)
    }

    fn map_state(status: &str) -> ProviderResult<SegmentJobState> {
        match status {
            "pending" | "queued" => Ok(SegmentJobState::Pending),
            "running" | "processing" | "in_progress" => Ok(SegmentJobState::Running),
            "succeeded" | "completed" => Ok(SegmentJobState::Succeeded),
            "failed" | "cancelled" => Ok(SegmentJobState::Failed),
            other => Err(ProviderError::InvalidResponse(format!(
                "unknown job status: {other}"
            ))),
        }
    }
}

#[async_trait]
impl VideoSegmentProvider for HttpVideoSegmentProvider {
    async fn start(
        &self,
        scene_prompt: &str,
        width: u32,
        height: u32,
        n_seconds: u32,
        continuity_hint: Option<&ContinuityHint>,
    ) -> ProviderResult<String> {
        let mut prompt = scene_prompt.to_string();
        if let Some(note) = continuity_hint.and_then(|h| h.note.as_deref()) {
            prompt.push_str("\n\n");
            prompt.push_str(note);
        }

        let url = format!("{}/v1/jobs", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&StartJobRequest {
                model: self.config.model.clone(),
                prompt,
                width,
                height,
                n_seconds,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let job: StartJobResponse = response.json().await?;
        info!(job_id = %job.id, n_seconds, "Started segment generation job");
        Ok(job.id)
    }

    async fn poll(&self, job_id: &str) -> ProviderResult<SegmentJobStatus> {
        let url = format!("{}/v1/jobs/{}", self.config.base_url, job_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let job: JobStatusResponse = response.json().await?;
        let state = Self::map_state(&job.status)?;
        debug!(job_id, status = %job.status, "Polled segment job");

        Ok(SegmentJobStatus {
            state,
            generation_ids: job.generations.into_iter().map(|g| g.id).collect(),
            error: job.failure_reason,
        })
    }

    async fn fetch_content(&self, generation_id: &str) -> ProviderResult<Vec<u8>> {
        let url = format!(
            "{}/v1/generations/{}/content",
            self.config.base_url, generation_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        info!(generation_id, bytes = bytes.len(), "Downloaded generation");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mapping() {
        assert_eq!(
            HttpVideoSegmentProvider::map_state("queued").unwrap(),
            SegmentJobState::Pending
        );
        assert_eq!(
            HttpVideoSegmentProvider::map_state("processing").unwrap(),
            SegmentJobState::Running
        );
        assert_eq!(
            HttpVideoSegmentProvider::map_state("succeeded").unwrap(),
            SegmentJobState::Succeeded
        );
        assert!(HttpVideoSegmentProvider::map_state("weird").is_err());
    }

    #[test]
    fn test_job_status_parsing() {
        let json = r#"{"status": "succeeded", "generations": [{"id": "gen-1"}]}"#;
        let parsed: JobStatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.generations.len(), 1);
        assert!(parsed.failure_reason.is_none());
    }
}
