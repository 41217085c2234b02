//! Supabase Storage over its REST API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{ObjectPath, ObjectStore, StorageError};
use crate::config::SupabaseCredentials;

#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(client: Client, credentials: &SupabaseCredentials) -> Self {
        Self {
            client,
            base_url: credentials.url.clone(),
            service_key: credentials.service_key.clone(),
        }
    }

    fn object_url(&self, path: &ObjectPath) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            path.bucket,
            encode_key(&path.key)
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }
}

/// Percent-encode each key segment, keeping the separators.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

async fn error_for(resp: reqwest::Response, path: &ObjectPath) -> StorageError {
    let status = resp.status();
    let message = resp.text().await.unwrap_or_default();
    // Storage reports missing objects as 400 with an error body on some versions.
    if status == StatusCode::NOT_FOUND
        || (status == StatusCode::BAD_REQUEST && message.contains("not_found"))
    {
        return StorageError::NotFound(path.to_string());
    }
    StorageError::Upstream {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn download(&self, path: &ObjectPath) -> Result<Vec<u8>, StorageError> {
        debug!("Downloading {} from Supabase Storage", path);
        let resp = self
            .authorized(self.client.get(self.object_url(path)))
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(error_for(resp, path).await);
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn upload(
        &self,
        path: &ObjectPath,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        debug!("Uploading {} bytes to {}", bytes.len(), path);
        let resp = self
            .authorized(self.client.post(self.object_url(path)))
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(error_for(resp, path).await);
        }
        Ok(())
    }

    async fn delete(&self, path: &ObjectPath) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, path.bucket);
        let resp = self
            .authorized(self.client.delete(url))
            .json(&serde_json::json!({ "prefixes": [path.key] }))
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(error_for(resp, path).await);
        }
        Ok(())
    }

    fn public_url(&self, path: &ObjectPath) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            path.bucket,
            encode_key(&path.key)
        )
    }
}
