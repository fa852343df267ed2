//! Health and system status handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use vidgen_models::{CacheStats, ProcessingLock};
use vidgen_storage::StorageStats;
use vidgen_store::locks::PROCESSING_LOCK_KEY;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
pub struct SystemStatusResponse {
    pub lock: ProcessingLock,
    pub storage: StorageStats,
    pub cache: CacheStats,
}

/// GET /api/system/status
pub async fn get_system_status(
    State(state): State<AppState>,
) -> ApiResult<Json<SystemStatusResponse>> {
    let lock = state.services.locks.status(PROCESSING_LOCK_KEY).await?;
    let storage = state
        .services
        .layout
        .stats()
        .await
        .map_err(|e| ApiError::internal(format!("storage stats failed: {e}")))?;
    let cache = state.services.cache.stats().await;

    Ok(Json(SystemStatusResponse {
        lock,
        storage,
        cache,
    }))
}
