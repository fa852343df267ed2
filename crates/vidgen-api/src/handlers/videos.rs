//! Video lifecycle handlers.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vidgen_models::{scenes_are_contiguous, Scene, VideoId, VideoRecord};
use vidgen_store::locks::PROCESSING_LOCK_KEY;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Owner identity header; authentication itself is a collaborator concern.
const USER_HEADER: &str = "x-user-id";

fn user_id_from(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

// ============================================================================
// Create
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateVideoRequest {
    pub prompt: String,
    #[serde(default)]
    pub original_prompt: Option<String>,
    pub duration: u32,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub scenes: Option<Vec<Scene>>,
}

#[derive(Serialize)]
pub struct CreateVideoResponse {
    pub id: String,
    pub title: String,
    pub target_duration: u32,
    pub segment_count: u32,
    pub status: String,
}

/// POST /api/videos/create
///
/// Validates, persists a pending record and kicks off the orchestrator in
/// the background. Refused with 503 while the processing lock is held.
pub async fn create_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateVideoRequest>,
) -> ApiResult<(StatusCode, Json<CreateVideoResponse>)> {
    let config = &state.services.config;

    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::bad_request("prompt must not be empty"));
    }
    if !config.duration_in_bounds(request.duration) {
        return Err(ApiError::bad_request(format!(
            "duration must be between {} and {} seconds",
            config.min_video_duration, config.max_video_duration
        )));
    }

    // Busy check: one run at a time, callers retry rather than queue.
    let lock = state.services.locks.status(PROCESSING_LOCK_KEY).await?;
    if lock.is_held(chrono::Utc::now()) {
        return Err(ApiError::Busy);
    }

    let user_id = user_id_from(&headers);
    let original_prompt = request
        .original_prompt
        .clone()
        .unwrap_or_else(|| prompt.to_string());

    let mut record = VideoRecord::new(&user_id, original_prompt, request.duration);
    if request.original_prompt.is_some() {
        // caller sent a pre-enhanced prompt alongside the original
        record.enhanced_prompt = Some(prompt.to_string());
    }
    record.metadata.voice_id = request.voice_id.clone();

    if let Some(scenes) = request.scenes {
        if scenes.len() != record.segment_count as usize {
            return Err(ApiError::bad_request(format!(
                "expected {} scenes for {}s, got {}",
                record.segment_count,
                record.target_duration,
                scenes.len()
            )));
        }
        if !scenes_are_contiguous(&scenes) {
            return Err(ApiError::bad_request("scenes are not ordered and contiguous"));
        }
        for scene in &scenes {
            scene
                .validate()
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
        }
        record.scenes = scenes;
    }

    state.services.videos.create(&record).await?;
    state
        .services
        .layout
        .ensure_video_tree(&user_id, &record.id)
        .await
        .map_err(|e| ApiError::internal(format!("failed to create video tree: {e}")))?;

    let estimated_bytes = state
        .services
        .layout
        .estimate_required_bytes(record.target_duration);
    info!(
        video_id = %record.id,
        user_id,
        duration = record.target_duration,
        estimated_bytes,
        "Video created"
    );

    // Drive the run in the background; the record carries its outcome.
    let orchestrator = state.orchestrator.clone();
    let video_id = record.id.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.process_video(&video_id).await {
            warn!(video_id = %video_id, error = %e, "Background run ended with error");
        }
    });

    Ok((
        StatusCode::CREATED,
        Json(CreateVideoResponse {
            id: record.id.to_string(),
            title: record.title,
            target_duration: record.target_duration,
            segment_count: record.segment_count,
            status: record.status.to_string(),
        }),
    ))
}

// ============================================================================
// Read
// ============================================================================

async fn load_record(state: &AppState, video_id: &str) -> ApiResult<VideoRecord> {
    state
        .services
        .videos
        .get(&VideoId::from_string(video_id))
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))
}

/// GET /api/videos/:video_id
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoRecord>> {
    Ok(Json(load_record(&state, &video_id).await?))
}

#[derive(Serialize)]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
    pub status: String,
    pub progress: u8,
    pub target_duration: u32,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<VideoSummary>,
}

/// GET /api/videos
pub async fn list_user_videos(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<VideoListResponse>> {
    let user_id = user_id_from(&headers);
    let videos = state
        .services
        .videos
        .list_by_user(&user_id)
        .await?
        .into_iter()
        .map(|record| VideoSummary {
            id: record.id.to_string(),
            title: record.title,
            status: record.status.to_string(),
            progress: record.progress,
            target_duration: record.target_duration,
            created_at: record.created_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(VideoListResponse { videos }))
}

#[derive(Serialize)]
pub struct VideoStatusResponse {
    pub status: String,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_segment: Option<u32>,
    pub segment_count: u32,
    pub completed_segments: u32,
    pub failed_segments: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub is_processing: bool,
}

/// GET /api/videos/:video_id/status
pub async fn get_video_status(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoStatusResponse>> {
    let record = load_record(&state, &video_id).await?;

    Ok(Json(VideoStatusResponse {
        status: record.status.to_string(),
        progress: record.progress,
        current_phase: record.current_phase.map(|p| p.to_string()),
        current_segment: record.current_segment,
        segment_count: record.segment_count,
        completed_segments: record.completed_segments(),
        failed_segments: record.failed_segments(),
        error_message: record.error_message.clone(),
        is_processing: record.status.is_processing(),
    }))
}

#[derive(Serialize)]
pub struct SegmentProjection {
    pub segment_number: u32,
    pub status: String,
    pub progress: u8,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Serialize)]
pub struct SegmentsResponse {
    pub video_id: String,
    pub segments: Vec<SegmentProjection>,
}

/// GET /api/videos/:video_id/segments
pub async fn get_video_segments(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<SegmentsResponse>> {
    let record = load_record(&state, &video_id).await?;

    let segments = record
        .segments
        .iter()
        .map(|segment| SegmentProjection {
            segment_number: segment.segment_number,
            status: segment.status.to_string(),
            progress: segment.progress(),
            retry_count: segment.retry_count,
            job_id: segment.job_id.clone(),
            error_message: segment.error_message.clone(),
        })
        .collect();

    Ok(Json(SegmentsResponse {
        video_id,
        segments,
    }))
}

// ============================================================================
// Cancel / Delete
// ============================================================================

#[derive(Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// POST /api/videos/:video_id/cancel
pub async fn cancel_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let record = load_record(&state, &video_id).await?;
    if record.status.is_terminal() {
        return Err(ApiError::conflict(format!(
            "video is already {}",
            record.status
        )));
    }

    let id = VideoId::from_string(&video_id);
    let cancelled = if state.services.cancels.cancel(&id) {
        // active run observes the flag between segments/phases
        true
    } else {
        // not yet picked up; fail it directly
        state
            .services
            .videos
            .mutate(&id, |r| r.fail("cancelled"))
            .await?;
        true
    };

    info!(video_id, "Cancellation requested");
    Ok(Json(CancelResponse { cancelled }))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// DELETE /api/videos/:video_id
pub async fn delete_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let record = load_record(&state, &video_id).await?;
    if !record.status.is_terminal() {
        return Err(ApiError::conflict(
            "video is still processing, cancel it first",
        ));
    }

    let id = VideoId::from_string(&video_id);
    state
        .services
        .layout
        .delete_video_tree(&record.user_id, &id)
        .await
        .map_err(|e| ApiError::internal(format!("failed to delete video tree: {e}")))?;
    let deleted = state.services.videos.delete(&id).await?;

    info!(video_id, "Video deleted");
    Ok(Json(DeleteResponse { deleted }))
}
