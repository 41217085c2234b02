//! Kling AI proxy. Every call carries a freshly signed JWT.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde_json::Value;

use super::{json_body, pass_through};
use crate::server::error::ApiError;
use crate::server::AppState;
use crate::upstream::kling::KlingClient;

fn client(state: &AppState) -> Result<KlingClient, ApiError> {
    Ok(KlingClient::from_settings(
        state.http.clone(),
        &state.settings.kling,
    )?)
}

pub async fn kling_generate(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let kling = client(&state)?;
    let body = json_body(payload)?;
    pass_through(kling.generate(&body).await?)
}

pub async fn kling_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    if task_id.trim().is_empty() {
        return Err(ApiError::bad_request("taskId is required"));
    }
    let kling = client(&state)?;
    pass_through(kling.status(task_id.trim()).await?)
}

pub async fn kling_credits(State(state): State<AppState>) -> Result<Response, ApiError> {
    let kling = client(&state)?;
    pass_through(kling.credits().await?)
}
