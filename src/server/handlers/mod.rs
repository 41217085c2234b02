//! HTTP request handlers.

mod ftp;
mod health;
mod kie;
mod kling;
mod prompts;
mod seedream;
mod storage;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::error::ApiError;
use crate::upstream::UpstreamResponse;

pub use ftp::{ftp_transfer, ftp_upload};
pub use health::health;
pub use kie::{kie_generate, kie_gpt4o_image, kie_image, kie_status, kie_status_by_id, kie_video};
pub use kling::{kling_credits, kling_generate, kling_status};
pub use prompts::list_prompts;
pub use seedream::seedream_generate;
pub use storage::storage_upload;

/// Fallback for known paths hit with the wrong method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Fallback for unknown paths.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Not found" })),
    )
        .into_response()
}

/// Unwrap a JSON body, turning extractor failures into a 400 envelope.
fn json_body<T: DeserializeOwned>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e.body_text())))
}

/// Unwrap query parameters, turning extractor failures into a 400 envelope.
fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(params)| params)
        .map_err(|e| ApiError::bad_request(format!("Invalid query string: {}", e.body_text())))
}

/// Return a successful upstream response as-is; otherwise pass status and
/// body through as an error.
fn pass_through(resp: UpstreamResponse) -> Result<Response, ApiError> {
    if resp.is_success() {
        Ok((resp.status, Json(resp.body)).into_response())
    } else {
        Err(ApiError::Upstream {
            status: resp.status,
            body: resp.body,
        })
    }
}

/// A required string field: present and non-blank.
fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{} is required", name)))
}
