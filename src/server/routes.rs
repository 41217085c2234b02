//! Route table for the HTTP service.
//!
//! Every `(method, path)` pair is listed here. Other methods on a listed path
//! get 405; unlisted paths get 404. OPTIONS on any path is answered by the
//! CORS layer.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers as h;
use super::AppState;

/// Execution limit for generation and status calls.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Execution limit for storage moves and uploads.
pub const STORAGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Request body cap for base64 image uploads.
pub const MAX_UPLOAD_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let generation = Router::new()
        // KIE.AI
        .route(
            "/api/kie/generate",
            post(h::kie_generate).fallback(h::method_not_allowed),
        )
        .route(
            "/api/kie/image",
            post(h::kie_image).fallback(h::method_not_allowed),
        )
        .route(
            "/api/kie/gpt4o-image",
            post(h::kie_gpt4o_image).fallback(h::method_not_allowed),
        )
        .route(
            "/api/kie/video",
            post(h::kie_video).fallback(h::method_not_allowed),
        )
        .route(
            "/api/kie/status",
            get(h::kie_status).fallback(h::method_not_allowed),
        )
        .route(
            "/api/kie/status/:task_id",
            get(h::kie_status_by_id).fallback(h::method_not_allowed),
        )
        // Seedream
        .route(
            "/api/seedream/generate",
            post(h::seedream_generate).fallback(h::method_not_allowed),
        )
        // Kling
        .route(
            "/api/kling/generate",
            post(h::kling_generate).fallback(h::method_not_allowed),
        )
        .route(
            "/api/kling/status/:task_id",
            get(h::kling_status).fallback(h::method_not_allowed),
        )
        .route(
            "/api/kling/credits",
            get(h::kling_credits).fallback(h::method_not_allowed),
        )
        // Community prompts
        .route(
            "/api/prompts",
            get(h::list_prompts).fallback(h::method_not_allowed),
        )
        .layer(TimeoutLayer::new(GENERATION_TIMEOUT));

    let storage = Router::new()
        .route(
            "/api/ftp/upload",
            post(h::ftp_upload).fallback(h::method_not_allowed),
        )
        .route(
            "/api/ftp/transfer",
            post(h::ftp_transfer).fallback(h::method_not_allowed),
        )
        .route(
            "/api/storage/upload",
            post(h::storage_upload).fallback(h::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .layer(TimeoutLayer::new(STORAGE_TIMEOUT));

    Router::new()
        .route("/health", get(h::health).fallback(h::method_not_allowed))
        .merge(generation)
        .merge(storage)
        .fallback(h::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
