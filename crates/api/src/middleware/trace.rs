//! Request logging on top of `tower-http`'s `TraceLayer`.
//!
//! Each request gets an `http_request` span with method, path, and
//! correlation ID. The response is logged at a level chosen by status
//! class; health probes stay at debug.

use std::time::Duration;

use axum::extract::OriginalUri;
use axum::http::{Request, Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{
    DefaultOnBodyChunk, DefaultOnEos, DefaultOnRequest, MakeSpan, OnResponse, TraceLayer,
};
use tracing::{Span, debug, debug_span, error, info, info_span, warn};

use filegate_shared::auth::CORRELATION_HEADER;

/// `TraceLayer` configured with [`RequestSpan`] and [`LogResponse`].
pub type HttpTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpan,
    DefaultOnRequest,
    LogResponse,
    DefaultOnBodyChunk,
    DefaultOnEos,
    (),
>;

/// Request logging for API routes.
pub fn http_trace_layer() -> HttpTraceLayer {
    trace_layer(false)
}

/// Request logging for health probes, at debug level.
pub fn quiet_trace_layer() -> HttpTraceLayer {
    trace_layer(true)
}

fn trace_layer(quiet: bool) -> HttpTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan { quiet })
        .on_response(LogResponse { quiet })
        .on_failure(())
}

/// Builds the per-request span.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan {
    quiet: bool,
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        // Nested routers see a stripped URI.
        let uri = request
            .extensions()
            .get::<OriginalUri>()
            .map_or_else(|| request.uri(), |original| &original.0);
        let correlation_id = request
            .headers()
            .get(CORRELATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if self.quiet {
            debug_span!(
                "http_request",
                method = %request.method(),
                path = %uri.path(),
                correlation_id,
            )
        } else {
            info_span!(
                "http_request",
                method = %request.method(),
                path = %uri.path(),
                query = uri.query().unwrap_or_default(),
                correlation_id,
            )
        }
    }
}

/// Logs the response status and latency.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogResponse {
    quiet: bool,
}

impl<B> OnResponse<B> for LogResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        let status = response.status();
        let code = status.as_u16();
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);

        if status.is_server_error() {
            error!(status = code, latency_ms, "Request failed");
        } else if self.quiet {
            debug!(status = code, latency_ms, "Request completed");
        } else if status.is_client_error() {
            warn!(status = code, latency_ms, "Request rejected");
        } else {
            info!(status = code, latency_ms, "Request completed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_trace_layer_passes_responses_through() {
        let app = Router::new()
            .route("/fail", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .layer(http_trace_layer());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/fail?x=1")
                    .header(CORRELATION_HEADER, "abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_nested_router_is_traced() {
        let inner = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .layer(quiet_trace_layer());
        let app = Router::new().nest("/api", inner);

        let response = app
            .oneshot(Request::builder().uri("/api/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
