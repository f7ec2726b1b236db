//! File routes for the configured bucket.

use axum::{
    Router,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use filegate_core::storage::{
    DEFAULT_CONTENT_TYPE, ObjectInfo, content_type_for, object_key_from_filename,
};
use filegate_shared::AppError;

use crate::{
    AppState,
    extractors::CorrelationId,
    response::{ApiError, ApiResponse, PresignedUrlResponse, storage_error},
};

/// Multipart field carrying the upload.
const FILE_FIELD: &str = "file";

/// Creates the file routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/files", get(list_files).post(upload_file))
        .route("/files/{filename}", get(download_file).delete(delete_file))
        .route("/files/{filename}/presigned-url", get(presigned_download))
}

// ============================================================================
// Response Types
// ============================================================================

/// Response for a completed upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Confirmation message.
    pub message: &'static str,
    /// Object key the file was stored under.
    pub filename: String,
    /// Stored size in bytes.
    pub size: u64,
    /// Bucket the file was stored in.
    pub bucket_name: String,
    /// Stored content type.
    pub content_type: String,
}

/// Entry in the file listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    /// Object key.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub last_modified: Option<String>,
    /// Content type, when known.
    pub content_type: Option<String>,
}

impl From<ObjectInfo> for FileSummary {
    fn from(info: ObjectInfo) -> Self {
        Self {
            name: info.key,
            size: info.size,
            last_modified: info.last_modified,
            content_type: info.content_type,
        }
    }
}

/// Response for a deletion.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    /// Confirmation message.
    pub message: &'static str,
    /// Deleted object key.
    pub filename: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn multipart_error(correlation_id: &CorrelationId, err: &MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return correlation_id.error(AppError::PayloadTooLarge(
            "File exceeds the maximum upload size".to_string(),
        ));
    }
    correlation_id.error(AppError::Validation(format!(
        "Failed to read multipart body: {}",
        err.body_text()
    )))
}

/// `Content-Disposition` for a download, with an RFC 5987 fallback for
/// names that are not plain ASCII.
fn content_disposition(filename: &str) -> HeaderValue {
    let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
    HeaderValue::from_str(&format!("attachment; filename=\"{escaped}\"")).unwrap_or_else(|_| {
        let encoded: String = filename
            .bytes()
            .map(|b| {
                if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
                    char::from(b).to_string()
                } else {
                    format!("%{b:02X}")
                }
            })
            .collect();
        HeaderValue::from_str(&format!("attachment; filename*=UTF-8''{encoded}"))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
    })
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/files`
/// Upload a file from the `file` multipart field.
async fn upload_file(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        correlation_id.error(AppError::Validation(rejection.body_text()))
    })?;

    let mut upload: Option<(String, Option<String>, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&correlation_id, &e))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let declared = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(&correlation_id, &e))?;
        upload = Some((filename, declared, data));
        break;
    }

    let Some((filename, declared, data)) = upload else {
        return Err(correlation_id.error(AppError::Validation(format!(
            "Failed to get file: multipart field '{FILE_FIELD}' is required"
        ))));
    };

    let key = object_key_from_filename(&filename)
        .map_err(|e| correlation_id.error(storage_error(e, "Failed to upload file")))?;
    let content_type = content_type_for(&key, declared.as_deref());

    let uploaded = state
        .storage
        .upload(&key, data, &content_type)
        .await
        .map_err(|e| correlation_id.error(storage_error(e, "Failed to upload file")))?;

    info!(
        correlation_id = %correlation_id,
        bucket = %uploaded.bucket,
        object = %uploaded.key,
        size = uploaded.size,
        "File uploaded successfully"
    );

    Ok(ApiResponse::new(
        correlation_id.0,
        UploadResponse {
            message: "File uploaded successfully",
            filename: uploaded.key,
            size: uploaded.size,
            bucket_name: uploaded.bucket,
            content_type: uploaded.content_type,
        },
    )
    .into_response())
}

/// GET `/files`
/// List every file in the bucket.
async fn list_files(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
) -> Result<Response, ApiError> {
    let objects = state
        .storage
        .list_objects()
        .await
        .map_err(|e| correlation_id.error(storage_error(e, "Failed to list files")))?;

    let files: Vec<FileSummary> = objects.into_iter().map(FileSummary::from).collect();
    Ok(ApiResponse::new(correlation_id.0, files).into_response())
}

/// GET `/files/{filename}`
/// Stream a file as an attachment.
async fn download_file(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let download = state
        .storage
        .open(&filename)
        .await
        .map_err(|e| correlation_id.error(storage_error(e, "Failed to get file")))?;

    let content_type = download
        .info
        .content_type
        .clone()
        .unwrap_or_else(|| content_type_for(&filename, None));
    let content_type = HeaderValue::from_str(&content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    info!(
        correlation_id = %correlation_id,
        filename = %filename,
        size = download.info.size,
        "Streaming file"
    );

    Ok((
        [
            (CONTENT_DISPOSITION, content_disposition(&filename)),
            (CONTENT_TYPE, content_type),
            (CONTENT_LENGTH, HeaderValue::from(download.info.size)),
        ],
        Body::from_stream(download.stream),
    )
        .into_response())
}

/// DELETE `/files/{filename}`
/// Delete a file. Deleting a missing file succeeds.
async fn delete_file(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    state
        .storage
        .delete(&filename)
        .await
        .map_err(|e| correlation_id.error(storage_error(e, "Failed to delete file")))?;

    info!(correlation_id = %correlation_id, filename = %filename, "File deleted successfully");

    Ok(ApiResponse::new(
        correlation_id.0,
        DeleteResponse {
            message: "File deleted successfully",
            filename,
        },
    )
    .into_response())
}

/// GET `/files/{filename}/presigned-url`
/// Presigned GET URL for an existing file.
async fn presigned_download(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    state
        .storage
        .stat(&filename)
        .await
        .map_err(|e| correlation_id.error(storage_error(e, "Failed to get file info")))?;

    let presigned = state
        .storage
        .presign_download(&filename)
        .await
        .map_err(|e| correlation_id.error(storage_error(e, "Failed to generate presigned URL")))?;

    Ok(ApiResponse::new(correlation_id.0, PresignedUrlResponse::from(presigned)).into_response())
}
