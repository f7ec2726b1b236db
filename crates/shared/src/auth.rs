//! Bearer token verification against the external auth service.
//!
//! Tokens are opaque to this service. Every protected request is verified
//! with a round trip to `{service_url}/api/v1/auth/verify`.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Path of the verification endpoint on the auth service.
pub const VERIFY_PATH: &str = "/api/v1/auth/verify";

/// Header used to forward the correlation ID to the auth service.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Longest response body kept from a rejected verification.
const MAX_BODY_CHARS: usize = 512;

/// Errors that can occur while parsing the Authorization header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Header absent or token empty.
    #[error("missing token")]
    Missing,

    /// Header is neither `Bearer <token>` nor a bare token.
    #[error("invalid authorization header format, expected 'Bearer <token>' or '<token>'")]
    Malformed,
}

/// Errors that can occur during token verification.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The auth service refused the token.
    #[error("token rejected with status {status}")]
    Rejected {
        /// Status returned by the auth service.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The auth service could not be reached.
    #[error("auth service unavailable: {0}")]
    Unavailable(String),

    /// The HTTP client could not be built.
    #[error("auth client configuration error: {0}")]
    Configuration(String),
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

/// Client for the token verification service.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    verify_url: String,
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("verify_url", &self.verify_url)
            .finish_non_exhaustive()
    }
}

impl AuthClient {
    /// Creates a client for the auth service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            verify_url: format!("{}{VERIFY_PATH}", base_url.trim_end_matches('/')),
        })
    }

    /// Full URL of the verification endpoint.
    #[must_use]
    pub fn verify_url(&self) -> &str {
        &self.verify_url
    }

    /// Verifies a token with the auth service.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` for any non-200 answer and
    /// `AuthError::Unavailable` when the service cannot be reached.
    pub async fn verify(&self, token: &str, correlation_id: Option<&str>) -> Result<(), AuthError> {
        debug!(url = %self.verify_url, "Verifying token with auth service");

        let mut request = self.http.post(&self.verify_url).json(&VerifyRequest { token });
        if let Some(id) = correlation_id {
            request = request.header(CORRELATION_HEADER, id);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %self.verify_url, error = %e, "Auth service request failed");
            AuthError::Unavailable(e.to_string())
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::OK {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read response body>".to_string());

        Err(AuthError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(MAX_BODY_CHARS).collect(),
        })
    }
}

/// Extracts the token from an Authorization header value.
///
/// Accepts `Bearer <token>` (scheme is case-insensitive) or a bare `<token>`.
///
/// # Errors
///
/// Returns `TokenError::Malformed` for any other shape and
/// `TokenError::Missing` when the token is empty.
pub fn extract_token(header: &str) -> Result<&str, TokenError> {
    let parts: Vec<&str> = header.split(' ').collect();

    let token = match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") => *token,
        [token] => *token,
        _ => return Err(TokenError::Malformed),
    };

    if token.is_empty() {
        return Err(TokenError::Missing);
    }

    Ok(token)
}
