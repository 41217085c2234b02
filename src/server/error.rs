//! One error type for every handler, rendered as the JSON envelope the
//! frontend expects.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use crate::prompts::PromptStoreError;
use crate::storage::{RelocationError, StorageError};
use crate::upstream::UpstreamError;

/// Generic detail attached to configuration and unexpected failures.
pub const FUNCTION_ERROR_DETAILS: &str = "Serverless function error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    NotFound(String),

    /// A required credential is absent. `debug` names which values are set.
    #[error("{message}")]
    NotConfigured {
        message: String,
        debug: Option<BTreeMap<&'static str, bool>>,
    },

    /// Upstream answered with a non-2xx status; both are passed through.
    #[error("Upstream returned {status}")]
    Upstream { status: StatusCode, body: Value },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_configured(
        message: impl Into<String>,
        debug: BTreeMap<&'static str, bool>,
    ) -> Self {
        ApiError::NotConfigured {
            message: message.into(),
            debug: Some(debug),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": message })),
            )
                .into_response(),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({ "error": "Method not allowed" })),
            )
                .into_response(),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "success": false, "error": message })),
            )
                .into_response(),
            ApiError::NotConfigured { message, debug } => {
                error!("Configuration error: {}", message);
                let mut body = json!({
                    "success": false,
                    "error": message,
                    "details": FUNCTION_ERROR_DETAILS,
                });
                if let Some(debug) = debug {
                    body["debug"] = json!(debug);
                }
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
            ApiError::Upstream { status, body } => (status, Json(body)).into_response(),
            ApiError::Internal(message) => {
                error!("Request failed: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": message,
                        "details": FUNCTION_ERROR_DETAILS,
                    })),
                )
                    .into_response()
            }
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::NotConfigured(_) => ApiError::NotConfigured {
                message: e.to_string(),
                debug: None,
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => ApiError::NotFound(e.to_string()),
            StorageError::InvalidName { .. } => ApiError::BadRequest(e.to_string()),
            StorageError::Upstream { status, ref message } => {
                match StatusCode::from_u16(status) {
                    Ok(status) => ApiError::Upstream {
                        status,
                        body: json!({ "success": false, "error": message }),
                    },
                    Err(_) => ApiError::Internal(e.to_string()),
                }
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RelocationError> for ApiError {
    fn from(e: RelocationError) -> Self {
        match e {
            RelocationError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PromptStoreError> for ApiError {
    fn from(e: PromptStoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}
