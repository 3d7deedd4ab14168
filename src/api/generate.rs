//! Generation endpoints

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
};
use bytes::Bytes;
use tracing::debug;

use super::body::{into_generation_request, parse_request_body};
use super::state::AppState;
use super::types::{ApiError, FacesResponse, GenerateResponse};

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// POST /api/generate-coin
pub async fn generate_coin(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ApiError> {
    let parsed = parse_request_body(body, content_type(&headers)).await?;
    let (request, _) = into_generation_request(parsed)?;

    debug!(
        product = %request.product,
        images = request.images.len(),
        "Generating design"
    );

    let outcome = state.generation_service.generate(request).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/generate-coin-faces
pub async fn generate_coin_faces(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FacesResponse>, ApiError> {
    let parsed = parse_request_body(body, content_type(&headers)).await?;
    let (request, descriptions) = into_generation_request(parsed)?;

    debug!(
        product = %request.product,
        images = request.images.len(),
        "Generating front and back designs"
    );

    let outcome = state
        .generation_service
        .generate_faces(request, descriptions)
        .await?;
    Ok(Json(outcome.into()))
}

/// Fallback for methods other than POST and OPTIONS
pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}
