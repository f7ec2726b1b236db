//! API route definitions.

use axum::{Router, middleware};

use crate::{
    AppState,
    middleware::{
        auth::auth_middleware,
        trace::{http_trace_layer, quiet_trace_layer},
    },
};

pub mod buckets;
pub mod files;
pub mod health;
pub mod r2;

/// Creates the `/api/v1` router; everything except health requires auth.
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    // Protected routes that require authentication
    let protected_routes = Router::new()
        .merge(files::routes())
        .merge(buckets::routes())
        .merge(r2::routes())
        .layer(middleware::from_fn_with_state(state, auth_middleware))
        .layer(http_trace_layer());

    Router::new()
        .merge(health::routes().layer(quiet_trace_layer()))
        .merge(protected_routes)
}
