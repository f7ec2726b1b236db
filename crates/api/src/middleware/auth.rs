//! Authentication middleware for protected routes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use filegate_shared::{AppError, AuthError, TokenError, extract_token};

use crate::{AppState, extractors::CorrelationId};

/// Authentication middleware that verifies bearer tokens remotely.
///
/// This middleware:
/// 1. Passes the request through when no auth service is configured
/// 2. Extracts the token from the Authorization header
/// 3. Verifies it with the auth service, forwarding the correlation ID
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(auth) = state.auth.as_ref() else {
        return next.run(request).await;
    };

    let correlation_id = CorrelationId::from_request(&request);

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if header.is_empty() {
        return correlation_id
            .error(AppError::Unauthorized(
                "Authorization header is required".to_string(),
            ))
            .into_response();
    }

    let token = match extract_token(header) {
        Ok(token) => token,
        Err(e) => {
            let message = match e {
                TokenError::Missing => "Token is required",
                TokenError::Malformed => {
                    "Invalid authorization header format, expected 'Bearer <token>' or '<token>'"
                }
            };
            return correlation_id
                .error(AppError::Unauthorized(message.to_string()))
                .into_response();
        }
    };

    match auth.verify(token, Some(correlation_id.as_str())).await {
        Ok(()) => next.run(request).await,
        Err(AuthError::Rejected { status, body }) => {
            warn!(
                correlation_id = %correlation_id,
                status,
                body = %body,
                "Token rejected by auth service"
            );
            correlation_id
                .error(AppError::Unauthorized(
                    "Invalid or expired token".to_string(),
                ))
                .into_response()
        }
        Err(e) => {
            error!(correlation_id = %correlation_id, error = %e, "Token verification failed");
            correlation_id
                .error(AppError::ServiceUnavailable(
                    "Authentication service unavailable".to_string(),
                ))
                .into_response()
        }
    }
}
