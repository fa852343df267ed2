//! Storyboard passthrough handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use vidgen_models::{timing, Scene};
use vidgen_providers::{Enhancement, StoryboardProvider};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnhanceRequest {
    pub prompt: String,
    #[serde(default)]
    pub duration: Option<u32>,
}

/// POST /api/prompts/enhance
pub async fn enhance_prompt(
    State(state): State<AppState>,
    Json(request): Json<EnhanceRequest>,
) -> ApiResult<Json<Enhancement>> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt must not be empty"));
    }
    let duration = request.duration.unwrap_or(60);

    let enhancement = state
        .services
        .storyboard
        .enhance(&request.prompt, duration)
        .await?;
    Ok(Json(enhancement))
}

#[derive(Debug, Deserialize)]
pub struct DecomposeRequest {
    pub prompt: String,
    pub duration: u32,
}

#[derive(Serialize)]
pub struct DecomposeResponse {
    pub scenes: Vec<Scene>,
    pub segment_duration: u32,
    pub segment_count: u32,
}

/// POST /api/prompts/decompose
pub async fn decompose_prompt(
    State(state): State<AppState>,
    Json(request): Json<DecomposeRequest>,
) -> ApiResult<Json<DecomposeResponse>> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt must not be empty"));
    }
    let config = &state.services.config;
    if !config.duration_in_bounds(request.duration) {
        return Err(ApiError::bad_request(format!(
            "duration must be between {} and {} seconds",
            config.min_video_duration, config.max_video_duration
        )));
    }

    let segment_duration = timing::segment_duration_for(request.duration);
    let scenes = state
        .services
        .storyboard
        .decompose(&request.prompt, request.duration, segment_duration)
        .await?;

    Ok(Json(DecomposeResponse {
        segment_count: scenes.len() as u32,
        segment_duration,
        scenes,
    }))
}
