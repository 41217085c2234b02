//! KIE.AI generation and status proxy.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{json_body, pass_through, query_params};
use crate::server::error::ApiError;
use crate::server::AppState;
use crate::upstream::kie::{normalize_status, KieClient, KieEndpoint, TaskKind};

fn client(state: &AppState) -> Result<KieClient, ApiError> {
    Ok(KieClient::from_settings(
        state.http.clone(),
        &state.settings.kie,
    )?)
}

/// Forward a generation body. Without a fixed endpoint, the body's `type`
/// picks one.
async fn forward(
    state: &AppState,
    endpoint: Option<KieEndpoint>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let kie = client(state)?;
    let body = json_body(payload)?;
    let endpoint = endpoint.unwrap_or_else(|| KieEndpoint::from_body(&body));
    debug!("KIE.AI generate via {:?}", endpoint);
    pass_through(kie.generate(endpoint, &body).await?)
}

/// Generation with the endpoint picked by the body's `type`.
pub async fn kie_generate(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    forward(&state, None, payload).await
}

pub async fn kie_image(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    forward(&state, Some(KieEndpoint::CreateTask), payload).await
}

pub async fn kie_gpt4o_image(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    forward(&state, Some(KieEndpoint::Gpt4oImage), payload).await
}

pub async fn kie_video(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    forward(&state, Some(KieEndpoint::VeoVideo), payload).await
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    #[serde(rename = "taskId")]
    pub task_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

async fn status_for(
    state: &AppState,
    task_id: Option<&str>,
    kind: Option<&str>,
) -> Result<Response, ApiError> {
    let task_id = task_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("taskId is required"))?;
    let kie = client(state)?;
    let kind = TaskKind::detect(task_id, kind);

    let raw = kie.record_info(task_id, kind).await?;
    if !raw.is_success() {
        return Err(ApiError::Upstream {
            status: raw.status,
            body: raw.body,
        });
    }
    Ok(Json(normalize_status(kind, &raw)).into_response())
}

/// Status with `taskId` (and optional `type`) in the query.
pub async fn kie_status(
    State(state): State<AppState>,
    params: Result<Query<StatusParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(params)?;
    status_for(&state, params.task_id.as_deref(), params.kind.as_deref()).await
}

/// Status with the task id in the path.
pub async fn kie_status_by_id(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    params: Result<Query<StatusParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let params = query_params(params)?;
    status_for(&state, Some(&task_id), params.kind.as_deref()).await
}
