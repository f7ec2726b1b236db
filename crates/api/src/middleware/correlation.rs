//! Correlation ID layers.
//!
//! An incoming `X-Correlation-ID` is kept as is; otherwise a UUID v4 is
//! generated. The value is echoed on the response either way.

use axum::http::HeaderName;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use filegate_shared::auth::CORRELATION_HEADER;

fn header_name() -> HeaderName {
    HeaderName::from_static(CORRELATION_HEADER)
}

/// Assigns a correlation ID to requests that lack one.
pub fn set_correlation_id() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(header_name(), MakeRequestUuid)
}

/// Copies the correlation ID onto the response.
pub fn propagate_correlation_id() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(header_name())
}
