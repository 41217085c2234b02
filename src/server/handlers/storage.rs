use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{json_body, required};
use crate::server::error::ApiError;
use crate::server::AppState;
use crate::storage::{decode_image_payload, detect_content_type, ObjectPath};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUploadBody {
    pub image_data: Option<String>,
    /// Object key; generated when absent.
    pub path: Option<String>,
    pub content_type: Option<String>,
}

fn extension_for(content_type: &str) -> &'static str {
    mime_guess::get_mime_extensions_str(content_type)
        .and_then(|exts| exts.first().copied())
        .unwrap_or("bin")
}

/// Upload a base64 image to Supabase Storage.
pub async fn storage_upload(
    State(state): State<AppState>,
    payload: Result<Json<StorageUploadBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(payload)?;
    let image_data = required(&body.image_data, "imageData")?;
    let store = state.object_store.clone().ok_or_else(|| {
        ApiError::not_configured(
            "Supabase configuration missing",
            state.settings.storage_presence(),
        )
    })?;

    let (bytes, data_url_mime) = decode_image_payload(image_data)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let declared = data_url_mime.or_else(|| body.content_type.clone());
    let requested_path = body
        .path
        .as_deref()
        .map(|p| p.trim().trim_start_matches('/'))
        .filter(|p| !p.is_empty());

    let content_type = detect_content_type(&bytes, declared.as_deref(), requested_path.unwrap_or(""));
    let key = match requested_path {
        Some(path) => {
            if path.split('/').any(|s| s == "..") {
                return Err(ApiError::bad_request("path must not contain '..'"));
            }
            path.to_string()
        }
        None => format!("uploads/{}.{}", uuid::Uuid::new_v4(), extension_for(&content_type)),
    };

    let object = ObjectPath::new(&state.settings.supabase.bucket, key);
    store.upload(&object, bytes, &content_type).await?;

    Ok(Json(json!({
        "success": true,
        "path": object.key,
        "url": store.public_url(&object),
    })))
}
