//! HLS/CMAF static serving at `/videos/{slug}/…` (§6).

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Response, StatusCode};

use vlog_storage::operations::content_headers_for_path;
use vlog_storage::StorageError;

use crate::error::ApiError;
use crate::security::{validate_slug, validate_static_tail};
use crate::state::AppState;

/// Serves one file under a video's storage prefix (playlist, segment, or
/// thumbnail), honoring `Range` for segment delivery.
pub async fn serve_asset(
    State(state): State<AppState>,
    Path((slug, tail)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response<Body>, ApiError> {
    validate_slug(&slug)?;
    validate_static_tail(&tail)?;

    let video = state.videos.get_by_slug(&slug).await?;
    let key = format!("{}/{}", video.id, tail);

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok()).map(|s| s.to_string());

    let (content_type, cache_control) = content_headers_for_path(&tail);

    let (bytes, content_length, _) = state
        .storage
        .get_object_range(&key, range_header.as_deref())
        .await
        .map_err(|e| match e {
            StorageError::NotFound(_) => ApiError::not_found("asset not found"),
            other => {
                tracing::warn!(error = %other, %key, "static asset read failed");
                ApiError::StorageUnavailable
            }
        })?;

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, cache_control)
        .header(header::ACCEPT_RANGES, "bytes");

    builder = if range_header.is_some() {
        builder.status(StatusCode::PARTIAL_CONTENT).header(header::CONTENT_LENGTH, bytes.len())
    } else {
        builder.status(StatusCode::OK).header(header::CONTENT_LENGTH, content_length)
    };

    builder.body(Body::from(bytes)).map_err(|e| ApiError::internal(format!("failed to build response: {e}")))
}
