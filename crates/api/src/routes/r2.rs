//! Cloudflare R2 routes.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use tracing::info;

use filegate_shared::AppError;

use crate::{
    AppState,
    extractors::CorrelationId,
    response::{ApiError, ApiResponse, PresignedUrlResponse, storage_error},
};

/// Creates the R2 routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/cloudflare/r2/upload/presigned-url",
        post(presigned_upload),
    )
}

/// Request body for a presigned upload URL.
#[derive(Debug, Deserialize)]
pub struct PresignedUploadRequest {
    /// Target bucket.
    pub bucket_name: String,
    /// Target object key.
    pub object_key: String,
    /// Lifetime in seconds; zero or negative means one hour.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// POST `/cloudflare/r2/upload/presigned-url`
/// Presigned PUT URL for a direct upload to R2.
async fn presigned_upload(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    body: Result<Json<PresignedUploadRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Some(r2) = state.r2.as_ref() else {
        return Err(correlation_id.error(AppError::ServiceUnavailable(
            "Cloudflare R2 is not configured".to_string(),
        )));
    };

    let Json(request) = body.map_err(|rejection| {
        correlation_id.error(AppError::Validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    })?;

    if request.bucket_name.trim().is_empty() {
        return Err(correlation_id.error(AppError::Validation(
            "bucket_name is required".to_string(),
        )));
    }
    if request.object_key.trim().is_empty() {
        return Err(correlation_id.error(AppError::Validation(
            "object_key is required".to_string(),
        )));
    }

    let presigned = r2
        .presign_upload(&request.bucket_name, &request.object_key, request.expires_in)
        .await
        .map_err(|e| correlation_id.error(storage_error(e, "Failed to generate presigned URL")))?;

    info!(
        correlation_id = %correlation_id,
        bucket = %request.bucket_name,
        object_key = %request.object_key,
        "Generated R2 presigned upload URL"
    );

    Ok(ApiResponse::new(correlation_id.0, PresignedUrlResponse::from(presigned)).into_response())
}
