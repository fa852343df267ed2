//! API routes.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::handlers::files::{stream_thumbnail, stream_video};
use crate::handlers::prompts::{decompose_prompt, enhance_prompt};
use crate::handlers::system::{get_system_status, health};
use crate::handlers::videos::{
    cancel_video, create_video, delete_video, get_video, get_video_segments, get_video_status,
    list_user_videos,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let video_routes = Router::new()
        .route("/videos", get(list_user_videos))
        .route("/videos/create", post(create_video))
        .route("/videos/:video_id", get(get_video).delete(delete_video))
        .route("/videos/:video_id/status", get(get_video_status))
        .route("/videos/:video_id/segments", get(get_video_segments))
        .route("/videos/:video_id/cancel", post(cancel_video));

    let prompt_routes = Router::new()
        .route("/prompts/enhance", post(enhance_prompt))
        .route("/prompts/decompose", post(decompose_prompt));

    let file_routes = Router::new()
        .route("/files/:video_id/video", get(stream_video))
        .route("/files/:video_id/thumbnail", get(stream_thumbnail));

    let system_routes = Router::new().route("/system/status", get(get_system_status));

    let api_routes = Router::new()
        .merge(video_routes)
        .merge(prompt_routes)
        .merge(file_routes)
        .merge(system_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
