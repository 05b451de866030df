//! Route modules for ReelStore Server

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod health;
pub mod resume;
pub mod status;
pub mod upload;

/// Multipart framing allowance on top of the largest accepted file
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let body_limit = state
        .config()
        .storage
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .nest("/health", health::router())
        .nest("/upload", upload::router())
        .nest("/upload-status", status::router())
        .nest("/upload-resume", resume::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
