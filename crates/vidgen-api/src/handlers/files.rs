//! Artifact delivery with HTTP range support.

use std::path::Path as FsPath;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use tracing::debug;

use vidgen_models::{VideoId, VideoStatus};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VideoQuality {
    #[serde(default)]
    pub quality: Option<String>,
}

/// GET /api/files/:video_id/video?quality={720p|480p}
pub async fn stream_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(params): Query<VideoQuality>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let id = VideoId::from_string(&video_id);
    let record = state
        .services
        .videos
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    if record.status != VideoStatus::Completed {
        return Err(ApiError::conflict("video is not finished"));
    }

    let quality = params.quality.as_deref().unwrap_or("720p");
    let path = match quality {
        "720p" => state.services.layout.final_720p_path(&record.user_id, &id),
        "480p" => state.services.layout.final_480p_path(&record.user_id, &id),
        other => {
            return Err(ApiError::bad_request(format!(
                "unknown quality {other:?}, expected 720p or 480p"
            )))
        }
    };

    serve_file(&path, "video/mp4", &headers).await
}

/// GET /api/files/:video_id/thumbnail
pub async fn stream_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let id = VideoId::from_string(&video_id);
    let record = state
        .services
        .videos
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    let path = state.services.layout.thumbnail_path(&record.user_id, &id);
    serve_file(&path, "image/jpeg", &headers).await
}

/// Serve a file with byte-range support.
async fn serve_file(path: &FsPath, content_type: &str, headers: &HeaderMap) -> ApiResult<Response> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"))
        }
        Err(e) => return Err(ApiError::internal(format!("read failed: {e}"))),
    };
    let total = bytes.len() as u64;

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, total));

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, "public, max-age=3600");

    let response = match range {
        Some((start, end)) => {
            debug!(start, end, total, "Serving byte range");
            let slice = bytes[start as usize..=(end as usize)].to_vec();
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_LENGTH, slice.len())
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {start}-{end}/{total}"),
                )
                .body(Body::from(slice))
        }
        None => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, total)
            .body(Body::from(bytes)),
    };

    response.map_err(|e| ApiError::internal(format!("failed to build response: {e}")))
}

/// Parse `bytes=start-end`, `bytes=start-` and `bytes=-suffix` into an
/// inclusive, clamped range.
fn parse_range(header: &str, total: u64) -> Option<(u64, u64)> {
    if total == 0 {
        return None;
    }
    let spec = header.strip_prefix("bytes=")?.split(',').next()?.trim();
    let (start, end) = spec.split_once('-')?;

    let range = match (start.is_empty(), end.is_empty()) {
        // bytes=-suffix
        (true, false) => {
            let suffix: u64 = end.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            (total.saturating_sub(suffix), total - 1)
        }
        // bytes=start-
        (false, true) => (start.parse().ok()?, total - 1),
        // bytes=start-end
        (false, false) => (start.parse().ok()?, end.parse().ok()?),
        (true, true) => return None,
    };

    let (start, end) = (range.0, range.1.min(total - 1));
    if start > end {
        return None;
    }
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_explicit_range() {
        assert_eq!(parse_range("bytes=0-99", 1000), Some((0, 99)));
        assert_eq!(parse_range("bytes=500-1500", 1000), Some((500, 999)));
    }

    #[test]
    fn test_parse_open_and_suffix_ranges() {
        assert_eq!(parse_range("bytes=900-", 1000), Some((900, 999)));
        assert_eq!(parse_range("bytes=-100", 1000), Some((900, 999)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_range("bytes=abc-def", 1000), None);
        assert_eq!(parse_range("octets=0-10", 1000), None);
        assert_eq!(parse_range("bytes=600-500", 1000), None);
        assert_eq!(parse_range("bytes=0-10", 0), None);
    }
}
