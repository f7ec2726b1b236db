//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for files, buckets, and R2 presigned uploads
//! - Correlation ID, request logging, CORS, and authentication middleware
//! - Request extractors
//! - The JSON response envelope

pub mod extractors;
pub mod middleware;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::{
    Router, extract::DefaultBodyLimit, http::header::AUTHORIZATION,
    middleware::from_fn_with_state,
};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;

use filegate_core::storage::{BucketAdmin, R2Presigner, StorageService};
use filegate_shared::AuthClient;

use crate::middleware::{
    correlation::{propagate_correlation_id, set_correlation_id},
    cors::{OriginPolicy, cors_layer, enforce_origin},
    trace::quiet_trace_layer,
};

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Object storage for the configured bucket.
    pub storage: Arc<StorageService>,
    /// Bucket administration (only for S3-compatible providers).
    pub buckets: Option<Arc<BucketAdmin>>,
    /// Cloudflare R2 presigner (optional).
    pub r2: Option<Arc<R2Presigner>>,
    /// Auth service client; `None` disables authentication.
    pub auth: Option<Arc<AuthClient>>,
}

impl AppState {
    /// State with storage only: no bucket admin, R2, or auth.
    pub fn new(storage: Arc<StorageService>) -> Self {
        Self {
            storage,
            buckets: None,
            r2: None,
            auth: None,
        }
    }
}

/// Router-level settings that are not needed by handlers.
#[derive(Debug, Clone, Default)]
pub struct RouterSettings {
    /// Development mode relaxes CORS.
    pub development: bool,
    /// Origins allowed outside development.
    pub allowed_origins: Vec<String>,
}

/// Creates the main application router.
pub fn create_router(state: AppState, settings: &RouterSettings) -> Router {
    let body_limit = usize::try_from(state.storage.config().max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let app = Router::new()
        .merge(routes::health::routes().layer(quiet_trace_layer()))
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    let app = app.layer(cors_layer(settings.development, &settings.allowed_origins));

    // Outside the CORS layer so preflights from unknown origins are refused
    // instead of answered.
    let app = if settings.development {
        app
    } else {
        app.layer(from_fn_with_state(
            OriginPolicy::new(&settings.allowed_origins),
            enforce_origin,
        ))
    };

    // The last layer added runs first: the correlation ID is assigned before
    // anything logs or rejects the request.
    app.layer(propagate_correlation_id())
        .layer(SetSensitiveRequestHeadersLayer::new([AUTHORIZATION]))
        .layer(set_correlation_id())
}
