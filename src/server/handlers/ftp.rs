//! FTP upload and Storage -> FTP transfer.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{json_body, required};
use crate::server::error::ApiError;
use crate::server::AppState;
use crate::storage::{
    dated_remote_path, decode_image_payload, FileHost, ObjectStore, RelocationRequest, Relocator,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBody {
    pub image_data: Option<String>,
    pub username: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    /// Object key inside the bucket.
    #[serde(alias = "storagePath", alias = "sourcePath")]
    pub path: Option<String>,
    pub bucket: Option<String>,
    pub username: Option<String>,
    /// Defaults to the last segment of `path`.
    pub filename: Option<String>,
}

fn file_host(state: &AppState) -> Result<Arc<dyn FileHost>, ApiError> {
    state.file_host.clone().ok_or_else(|| {
        ApiError::not_configured("FTP configuration missing", state.settings.storage_presence())
    })
}

fn object_store(state: &AppState) -> Result<Arc<dyn ObjectStore>, ApiError> {
    state.object_store.clone().ok_or_else(|| {
        ApiError::not_configured(
            "Supabase configuration missing",
            state.settings.storage_presence(),
        )
    })
}

/// Upload a base64 image straight to the FTP host.
pub async fn ftp_upload(
    State(state): State<AppState>,
    payload: Result<Json<UploadBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(payload)?;
    let image_data = required(&body.image_data, "imageData")?;
    let username = required(&body.username, "username")?;
    let filename = required(&body.filename, "filename")?;
    let host = file_host(&state)?;

    let remote = dated_remote_path(username, filename, Utc::now())?;
    let (bytes, _) = decode_image_payload(image_data)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let size = bytes.len();

    host.upload(&remote, bytes).await?;
    let url = host.public_url(&remote);
    info!("Uploaded {} bytes for {} to {}", size, username, remote.full_path());

    Ok(Json(json!({
        "success": true,
        "url": url,
        "path": remote.full_path(),
        "size": size,
    })))
}

/// Move an object from Supabase Storage to the FTP host.
pub async fn ftp_transfer(
    State(state): State<AppState>,
    payload: Result<Json<TransferBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = json_body(payload)?;
    let key = required(&body.path, "path")?.trim_start_matches('/');
    let username = required(&body.username, "username")?;
    let filename = match body.filename.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => key
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("filename is required"))?,
    };
    let bucket = body
        .bucket
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(state.settings.supabase.bucket.as_str());

    let relocator = Relocator::new(
        object_store(&state)?,
        file_host(&state)?,
        state.db.relocations(),
    );
    let request = RelocationRequest {
        bucket: bucket.to_string(),
        key: key.to_string(),
        username: username.to_string(),
        filename: filename.to_string(),
    };
    let outcome = relocator.relocate(&request, Utc::now()).await?;

    Ok(Json(json!({
        "success": true,
        "url": outcome.url,
        "path": outcome.path,
        "sourceDeleted": outcome.source_deleted,
    })))
}
