use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde_json::Value;

use super::{json_body, pass_through};
use crate::server::error::ApiError;
use crate::server::AppState;
use crate::upstream::seedream::SeedreamClient;

/// Seedream image generation, body forwarded verbatim.
pub async fn seedream_generate(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let seedream = SeedreamClient::from_settings(state.http.clone(), &state.settings.seedream)?;
    let body = json_body(payload)?;
    pass_through(seedream.generate(&body).await?)
}
