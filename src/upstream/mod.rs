//! Outbound clients for the third-party generation APIs.
//!
//! Every call is a single attempt: build the request, attach the server-held
//! credential, send, and hand back the status plus JSON body. Callers decide
//! how to present upstream failures.

pub mod kie;
pub mod kling;
pub mod seedream;

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::Settings;

/// Errors from talking to an upstream API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    #[error("Failed to reach upstream: {0}")]
    Connection(String),

    #[error("Failed to read upstream response: {0}")]
    Parse(String),

    #[error("Failed to sign request: {0}")]
    Signing(String),
}

/// Status and body returned by an upstream call.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Shared HTTP client for upstream calls.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    /// Build the client from settings (timeout, user agent).
    pub fn new(settings: &Settings) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(Duration::from_secs(settings.request_timeout))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| UpstreamError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    /// The underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Send one JSON request with a bearer token and read the JSON response.
    ///
    /// Non-JSON bodies are wrapped as `{"raw": "<text>"}` so the caller always
    /// gets a JSON value to pass through.
    pub async fn send_json(
        &self,
        method: Method,
        url: &str,
        bearer: &str,
        body: Option<&Value>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        debug!("Upstream {} {}", method, url);

        let mut request = self.client.request(method, url).bearer_auth(bearer);
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| UpstreamError::Connection(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| UpstreamError::Parse(e.to_string()))?;

        debug!("Upstream responded {} ({} bytes)", status, text.len());

        Ok(UpstreamResponse {
            status,
            body: parse_body(&text),
        })
    }
}

/// Parse an upstream body as JSON, falling back to a raw text wrapper.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "raw": text }))
}

/// Join a base URL and a path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
