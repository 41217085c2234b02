//! Kling AI image generation, task status and account credits.

pub mod jwt;

use chrono::{Duration, Utc};
use reqwest::Method;
use serde_json::Value;

use super::{join_url, UpstreamClient, UpstreamError, UpstreamResponse};
use crate::config::KlingSettings;

const GENERATIONS_PATH: &str = "/v1/images/generations";
const ACCOUNT_COSTS_PATH: &str = "/account/costs";

/// Window queried for resource pack usage.
const CREDITS_WINDOW_DAYS: i64 = 30;

pub struct KlingClient {
    http: UpstreamClient,
    access_key: String,
    secret_key: String,
    base_url: String,
}

impl KlingClient {
    pub fn from_settings(
        http: UpstreamClient,
        settings: &KlingSettings,
    ) -> Result<Self, UpstreamError> {
        match (&settings.access_key, &settings.secret_key) {
            (Some(access_key), Some(secret_key)) => Ok(Self {
                http,
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                base_url: settings.api_url.clone(),
            }),
            _ => Err(UpstreamError::NotConfigured("Kling API keys")),
        }
    }

    fn token(&self) -> Result<String, UpstreamError> {
        jwt::sign_now(&self.access_key, &self.secret_key)
            .map_err(|e| UpstreamError::Signing(e.to_string()))
    }

    /// Submit an image generation task.
    pub async fn generate(&self, body: &Value) -> Result<UpstreamResponse, UpstreamError> {
        let token = self.token()?;
        let url = join_url(&self.base_url, GENERATIONS_PATH);
        self.http
            .send_json(Method::POST, &url, &token, Some(body))
            .await
    }

    /// Query one task.
    pub async fn status(&self, task_id: &str) -> Result<UpstreamResponse, UpstreamError> {
        let token = self.token()?;
        let url = format!(
            "{}/{}",
            join_url(&self.base_url, GENERATIONS_PATH),
            urlencoding::encode(task_id)
        );
        self.http.send_json(Method::GET, &url, &token, None).await
    }

    /// Resource pack usage over the last 30 days.
    pub async fn credits(&self) -> Result<UpstreamResponse, UpstreamError> {
        let token = self.token()?;
        let end = Utc::now();
        let start = end - Duration::days(CREDITS_WINDOW_DAYS);
        let url = format!(
            "{}?start_time={}&end_time={}",
            join_url(&self.base_url, ACCOUNT_COSTS_PATH),
            start.timestamp_millis(),
            end.timestamp_millis()
        );
        self.http.send_json(Method::GET, &url, &token, None).await
    }
}
