//! Bucket routes.

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;

use filegate_core::storage::BucketInfo;
use filegate_shared::AppError;

use crate::{
    AppState,
    extractors::CorrelationId,
    response::{ApiError, ApiResponse, storage_error},
};

/// Creates the bucket routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/buckets", get(list_buckets))
}

/// Entry in the bucket listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSummary {
    /// Bucket name.
    pub name: String,
    /// Creation date (RFC 3339).
    pub creation_date: Option<String>,
}

impl From<BucketInfo> for BucketSummary {
    fn from(info: BucketInfo) -> Self {
        Self {
            name: info.name,
            creation_date: info.creation_date,
        }
    }
}

/// GET `/buckets`
/// List buckets visible to the storage credentials.
async fn list_buckets(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
) -> Result<Response, ApiError> {
    let Some(admin) = state.buckets.as_ref() else {
        return Err(correlation_id.error(AppError::NotImplemented(
            "Bucket listing is not supported by the configured storage backend".to_string(),
        )));
    };

    let buckets = admin
        .list_buckets()
        .await
        .map_err(|e| correlation_id.error(storage_error(e, "Failed to list buckets")))?;

    let buckets: Vec<BucketSummary> = buckets.into_iter().map(BucketSummary::from).collect();
    Ok(ApiResponse::new(correlation_id.0, buckets).into_response())
}
