//! LLM storyboard client.
//!
//! Talks to an OpenAI-compatible chat completions endpoint in JSON mode and
//! turns the responses into scenes and narration scripts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vidgen_models::{timing, Scene, TransitionType};

use crate::error::{ProviderError, ProviderResult};
use crate::traits::StoryboardProvider;
use crate::types::{Enhancement, SCENE_BREAK};

/// Configuration for the storyboard client.
#[derive(Debug, Clone)]
pub struct StoryboardConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl StoryboardConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            base_url: std::env::var("STORYBOARD_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            api_key: std::env::var("STORYBOARD_API_KEY")
                .map_err(|_| ProviderError::Config("STORYBOARD_API_KEY not set".into()))?,
            model: std::env::var("STORYBOARD_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout: Duration::from_secs(
                std::env::var("STORYBOARD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        })
    }
}

/// HTTP storyboard provider.
pub struct HttpStoryboardProvider {
    http: Client,
    config: StoryboardConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Scene as the model returns it; times are assigned locally.
#[derive(Debug, Deserialize)]
struct SceneDto {
    scene_number: u32,
    scene_prompt: String,
    #[serde(default)]
    visual_description: Option<String>,
    #[serde(default)]
    continuity_notes: Option<String>,
    #[serde(default)]
    narration_text: Option<String>,
    #[serde(default)]
    transition_type: Option<TransitionType>,
}

#[derive(Debug, Deserialize)]
struct ScenesDto {
    scenes: Vec<SceneDto>,
}

impl HttpStoryboardProvider {
    pub fn new(config: StoryboardConfig) -> ProviderResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(StoryboardConfig::from_env()?)
    }

    /// One chat completion in JSON mode, returning the raw content.
    async fn chat(&self, system: &str, user: String, json_mode: bool) -> ProviderResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("empty choices".into()))?;

        debug!(len = content.len(), "Storyboard model responded");
        Ok(content)
    }
}

#[async_trait]
impl StoryboardProvider for HttpStoryboardProvider {
    async fn enhance(&self, prompt: &str, target_duration: u32) -> ProviderResult<Enhancement> {
        let system = "You are a film storyboard author. Rewrite user prompts into vivid, \
                      cinematic video generation prompts. Respond with a JSON object: \
                      {\"enhanced_prompt\", \"title\", \"keywords\", \"estimated_duration\"}.";
        let user = format!(
            "Rewrite this prompt for a {target_duration}-second video. Keep the subject, add \
             camera and lighting direction.\n\nPrompt: {prompt}"
        );

        let content = self.chat(system, user, true).await?;
        let enhancement: Enhancement = serde_json::from_str(&content)
            .map_err(|e| ProviderError::InvalidResponse(format!("enhance payload: {e}")))?;
        Ok(enhancement)
    }

    async fn decompose(
        &self,
        prompt: &str,
        target_duration: u32,
        segment_duration: u32,
    ) -> ProviderResult<Vec<Scene>> {
        let count = timing::segment_count(target_duration, segment_duration);
        let system = "You are a film storyboard author. Break a video concept into scenes. \
                      Respond with a JSON object: {\"scenes\": [{\"scene_number\", \
                      \"scene_prompt\", \"visual_description\", \"continuity_notes\", \
                      \"narration_text\", \"transition_type\"}]}. transition_type is \
                      \"crossfade\" or \"cut\".";
        let user = format!(
            "Break this concept into exactly {count} scenes of {segment_duration} seconds each \
             for a {target_duration}-second video. Scenes must flow into each other visually. \
             Each narration_text must be one short spoken sentence.\n\nConcept: {prompt}"
        );

        let content = self.chat(system, user, true).await?;
        let dto: ScenesDto = serde_json::from_str(&content)
            .map_err(|e| ProviderError::InvalidResponse(format!("decompose payload: {e}")))?;

        if dto.scenes.len() != count as usize {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {count} scenes, model returned {}",
                dto.scenes.len()
            )));
        }

        let mut scenes = Vec::with_capacity(dto.scenes.len());
        for (i, scene) in dto.scenes.into_iter().enumerate() {
            let n = (i + 1) as u32;
            if scene.scene_number != n {
                warn!(
                    expected = n,
                    got = scene.scene_number,
                    "Model misnumbered a scene, renumbering"
                );
            }
            let (start_time, end_time) = timing::scene_bounds(n, segment_duration, target_duration);
            let scene = Scene {
                scene_number: n,
                scene_prompt: scene.scene_prompt,
                visual_description: scene.visual_description,
                continuity_notes: scene.continuity_notes,
                narration_text: scene.narration_text,
                start_time,
                end_time,
                transition_type: scene.transition_type.unwrap_or_default(),
            };
            scene
                .validate()
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
            scenes.push(scene);
        }

        Ok(scenes)
    }

    async fn write_narration(
        &self,
        prompt: &str,
        scenes: &[Scene],
        target_duration: u32,
    ) -> ProviderResult<String> {
        let scene_list = scenes
            .iter()
            .map(|s| format!("{}. {}", s.scene_number, s.scene_prompt))
            .collect::<Vec<_>>()
            .join("\n");
        let system = format!(
            "You are a voice-over writer. Write a narration script for a short video. \
             Separate the narration of each scene with the exact marker {SCENE_BREAK}. \
             Respond with the script only."
        );
        let user = format!(
            "Write narration for a {target_duration}-second video about: {prompt}\n\n\
             Scenes:\n{scene_list}\n\nThe whole script must be speakable in \
             {target_duration} seconds at a calm pace."
        );

        let script = self.chat(&system, user, false).await?;
        if script.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("empty narration script".into()));
        }
        Ok(script.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_dto_parsing() {
        let json = r#"{
            "scenes": [
                {"scene_number": 1, "scene_prompt": "Eagle takes off", "narration_text": "It begins.", "transition_type": "crossfade"},
                {"scene_number": 2, "scene_prompt": "Eagle soars above peaks"}
            ]
        }"#;
        let dto: ScenesDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.scenes.len(), 2);
        assert!(dto.scenes[1].transition_type.is_none());
    }

    #[test]
    fn test_enhancement_parsing_tolerates_missing_fields() {
        let json = r#"{"enhanced_prompt": "A cinematic eagle", "title": "Eagle"}"#;
        let enhancement: Enhancement = serde_json::from_str(json).unwrap();
        assert!(enhancement.keywords.is_empty());
        assert!(enhancement.estimated_duration.is_none());
    }
}
