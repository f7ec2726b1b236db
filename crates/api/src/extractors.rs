//! Request extractors.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request},
    http::{Extensions, HeaderMap, request::Parts},
};
use tower_http::request_id::RequestId;
use uuid::Uuid;

use filegate_shared::AppError;
use filegate_shared::auth::CORRELATION_HEADER;

use crate::response::ApiError;

/// Correlation ID of the current request.
///
/// Set by the request-id layer; a fresh UUID is used if a handler runs
/// without it (for example in unit tests that skip the layer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// Read the ID from request parts.
    pub fn from_parts(parts: &Parts) -> Self {
        Self::lookup(&parts.extensions, &parts.headers)
    }

    /// Read the ID from a full request, for use in middleware.
    pub fn from_request(request: &Request) -> Self {
        Self::lookup(request.extensions(), request.headers())
    }

    fn lookup(extensions: &Extensions, headers: &HeaderMap) -> Self {
        let from_extension = extensions
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok());

        let from_header = || {
            headers
                .get(CORRELATION_HEADER)
                .and_then(|value| value.to_str().ok())
        };

        from_extension
            .or_else(from_header)
            .filter(|id| !id.is_empty())
            .map_or_else(|| Self(Uuid::new_v4().to_string()), |id| Self(id.to_string()))
    }

    /// Borrow the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Attach this ID to an error.
    #[must_use]
    pub fn error(&self, error: AppError) -> ApiError {
        ApiError::new(self.0.clone(), error)
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}
