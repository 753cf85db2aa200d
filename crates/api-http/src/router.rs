//! Router assembly.
//!
//! [`build_router`] wires the handlers to their routes with request-level
//! tracing.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/predict",
            post(handlers::predict).fallback(handlers::method_not_allowed),
        )
        .route("/healthz", get(handlers::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
