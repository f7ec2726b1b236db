//! JSON response envelope.
//!
//! Every JSON body carries the request's correlation ID next to either a
//! `data` payload or an `error` object.

use std::collections::HashMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use filegate_core::storage::{PresignedUrl, StorageError};
use filegate_shared::AppError;

/// Successful response body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Correlation ID of the request.
    pub correlation_id: String,
    /// Response payload.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a payload for the given request.
    pub fn new(correlation_id: impl Into<String>, data: T) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Presigned URL as returned to clients.
#[derive(Debug, Serialize)]
pub struct PresignedUrlResponse {
    /// URL to call.
    pub url: String,
    /// HTTP method the URL was signed for.
    pub method: String,
    /// Expiry as Unix seconds.
    pub expires_at: i64,
    /// Headers the client must send with the request.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl From<PresignedUrl> for PresignedUrlResponse {
    fn from(presigned: PresignedUrl) -> Self {
        Self {
            url: presigned.url,
            method: presigned.method,
            expires_at: presigned.expires_at.timestamp(),
            headers: presigned.headers,
        }
    }
}

/// Error object inside the envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable error code.
    pub code: &'static str,
    /// Human readable message.
    pub message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    correlation_id: &'a str,
    error: ErrorBody,
}

/// Handler error carrying the correlation ID it is reported under.
#[derive(Debug)]
pub struct ApiError {
    /// Correlation ID of the failed request.
    pub correlation_id: String,
    /// Underlying error.
    pub error: AppError,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(correlation_id: impl Into<String>, error: AppError) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = ErrorEnvelope {
            correlation_id: &self.correlation_id,
            error: ErrorBody {
                code: self.error.error_code(),
                message: self.error.message().to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Translate a storage failure into an application error.
///
/// Backend failures are logged here and reported with `context` only, so
/// backend details never reach the client.
pub fn storage_error(err: StorageError, context: &str) -> AppError {
    match err {
        StorageError::FileTooLarge { size, max } => AppError::PayloadTooLarge(format!(
            "File size {size} bytes exceeds maximum of {max} bytes"
        )),
        StorageError::NotFound { .. } => AppError::NotFound("File not found".to_string()),
        StorageError::InvalidKey(key) => AppError::Validation(format!("Invalid filename: {key}")),
        StorageError::InvalidBucket(bucket) => {
            AppError::Validation(format!("Invalid bucket name: {bucket}"))
        }
        err @ StorageError::InvalidExpiry { .. } => AppError::Validation(err.to_string()),
        err @ (StorageError::PresignNotSupported | StorageError::Unsupported(_)) => {
            AppError::NotImplemented(err.to_string())
        }
        err @ (StorageError::Configuration(_) | StorageError::Operation(_)) => {
            error!(error = %err, "{context}");
            AppError::Internal(context.to_string())
        }
    }
}
