//! Defines the routes of the file-hosting service.
//!
//! ## Structure
//! - `GET  /`      — usage instructions
//! - `POST /`      — upload a file, answered with its one-time URL
//! - `HEAD /{id}`  — object metadata, does not consume
//! - `GET  /{id}`  — download the object, which deletes it
//! - `GET  /healthz`, `GET /readyz` — liveness and readiness

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{download_object, probe_object, upload_object},
        usage_handlers::usage,
    },
    state::AppState,
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use tower_http::trace::TraceLayer;

/// Slack on top of the payload limit for multipart boundaries and part
/// headers. The store enforces the exact payload limit itself.
const MULTIPART_ENVELOPE: usize = 64 * 1024;

/// Build and return the router for all routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/", get(usage).post(upload_object))
        .route("/{id}", get(download_object).head(probe_object))
}

/// The complete application: routes, request body limit, tracing and state.
pub fn app(state: AppState) -> Router {
    let body_limit = state.store.max_size().saturating_add(MULTIPART_ENVELOPE);
    routes()
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
