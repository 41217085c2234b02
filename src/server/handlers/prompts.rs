use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::query_params;
use crate::server::error::ApiError;
use crate::server::AppState;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct PromptListParams {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

/// Active community prompts, most liked first.
pub async fn list_prompts(
    State(state): State<AppState>,
    params: Result<Query<PromptListParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let params = query_params(params)?;
    let store = state.prompt_store.clone().ok_or_else(|| {
        ApiError::not_configured(
            "Supabase configuration missing",
            state.settings.storage_presence(),
        )
    })?;

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let category = params
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let prompts = store.list_active(category, limit).await?;

    Ok(Json(json!({
        "success": true,
        "count": prompts.len(),
        "prompts": prompts,
    })))
}
