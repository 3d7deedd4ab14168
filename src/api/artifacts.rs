//! Download endpoint for transient artifacts

use axum::{
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};

use super::state::AppState;
use super::types::ApiError;

/// GET /api/artifacts/{id}
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (artifact, bytes) = state.artifacts.get(&id).await?;

    let content_type = HeaderValue::from_str(&artifact.media_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let extension = artifact
        .path()
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let disposition = HeaderValue::from_str(&format!(
        "inline; filename=\"{}.{}\"",
        artifact.id, extension
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("inline"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        bytes,
    )
        .into_response())
}
