//! CORS policy.
//!
//! Development mirrors whatever the browser asks for. Production answers
//! only allow-listed origins and refuses requests from any other origin.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{
        HeaderName, HeaderValue, Method,
        header::{
            ACCEPT_ENCODING, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN,
        },
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};
use tracing::warn;

use filegate_shared::AppError;

use crate::extractors::CorrelationId;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(86_400);

fn exposed_headers() -> ExposeHeaders {
    ExposeHeaders::list([
        CONTENT_LENGTH,
        CONTENT_TYPE,
        HeaderName::from_static("x-request-id"),
        HeaderName::from_static("x-correlation-id"),
    ])
}

/// Build the CORS layer for the environment.
pub fn cors_layer(development: bool, allowed_origins: &[String]) -> CorsLayer {
    if development {
        return CorsLayer::very_permissive().expose_headers(exposed_headers());
    }

    let allow_headers = AllowHeaders::list([
        ORIGIN,
        CONTENT_TYPE,
        CONTENT_LENGTH,
        ACCEPT_ENCODING,
        HeaderName::from_static("x-csrf-token"),
        AUTHORIZATION,
        HeaderName::from_static("x-requested-with"),
        HeaderName::from_static("x-request-id"),
        HeaderName::from_static("x-correlation-id"),
    ]);
    let allow_methods = AllowMethods::list([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::OPTIONS,
    ]);
    let cors = CorsLayer::new()
        .allow_methods(allow_methods)
        .allow_headers(allow_headers)
        .expose_headers(exposed_headers())
        .max_age(PREFLIGHT_MAX_AGE);

    // Credentials cannot be combined with a wildcard origin.
    if allowed_origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(Any);
    }
    let list = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    cors.allow_origin(AllowOrigin::list(list))
        .allow_credentials(true)
}

/// Origins accepted in production.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Arc<[String]>,
}

impl OriginPolicy {
    /// Create a policy from the configured allow-list.
    pub fn new(allowed: &[String]) -> Self {
        Self {
            allowed: allowed.into(),
        }
    }

    /// Whether a request from `origin` may proceed.
    pub fn allows(&self, origin: &str) -> bool {
        self.allowed
            .iter()
            .any(|allowed| allowed == "*" || allowed == origin)
    }
}

/// Reject requests whose `Origin` header is not allow-listed.
///
/// Requests without an `Origin` header (server-to-server, curl) pass.
pub async fn enforce_origin(
    State(policy): State<OriginPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .map(|value| value.to_str().unwrap_or_default().to_string());

    match origin {
        Some(origin) if !policy.allows(&origin) => {
            warn!(origin = %origin, "Rejected request from disallowed origin");
            CorrelationId::from_request(&request)
                .error(AppError::Forbidden("Origin not allowed".to_string()))
                .into_response()
        }
        _ => next.run(request).await,
    }
}
