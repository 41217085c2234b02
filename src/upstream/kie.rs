//! KIE.AI generation and task status.
//!
//! KIE.AI exposes separate endpoints for image jobs and Veo video jobs, and
//! the two status endpoints return different shapes. [`normalize_status`]
//! folds both into one [`TaskStatus`].

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::{join_url, UpstreamClient, UpstreamError, UpstreamResponse};
use crate::config::KieSettings;

/// Prefix KIE.AI assigns to Veo video task ids.
pub const VIDEO_TASK_PREFIX: &str = "veo_";

/// Generation endpoint selected by route or by the body `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KieEndpoint {
    /// Market models (`/api/v1/jobs/createTask`).
    CreateTask,
    /// GPT-4o image (`/api/v1/gpt4o-image/generate`).
    Gpt4oImage,
    /// Veo video (`/api/v1/veo/generate`).
    VeoVideo,
}

impl KieEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            KieEndpoint::CreateTask => "/api/v1/jobs/createTask",
            KieEndpoint::Gpt4oImage => "/api/v1/gpt4o-image/generate",
            KieEndpoint::VeoVideo => "/api/v1/veo/generate",
        }
    }

    /// Pick the endpoint from a request body's `type` field.
    pub fn from_body(body: &Value) -> Self {
        match body.get("type").and_then(|t| t.as_str()) {
            Some(t) => Self::from_type(t),
            None => KieEndpoint::CreateTask,
        }
    }

    fn from_type(t: &str) -> Self {
        match t.to_ascii_lowercase().as_str() {
            "video" | "veo" => KieEndpoint::VeoVideo,
            "gpt4o" | "gpt4o-image" | "4o" => KieEndpoint::Gpt4oImage,
            _ => KieEndpoint::CreateTask,
        }
    }
}

/// Kind of task being polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Image,
    Video,
}

impl TaskKind {
    /// An explicit `type` wins; otherwise the `veo_` id prefix marks video.
    pub fn detect(task_id: &str, type_param: Option<&str>) -> Self {
        match type_param.map(|t| t.to_ascii_lowercase()) {
            Some(t) if t == "video" || t == "veo" => TaskKind::Video,
            Some(t) if t == "image" => TaskKind::Image,
            _ if task_id.starts_with(VIDEO_TASK_PREFIX) => TaskKind::Video,
            _ => TaskKind::Image,
        }
    }

    fn status_path(&self) -> &'static str {
        match self {
            TaskKind::Image => "/api/v1/jobs/recordInfo",
            TaskKind::Video => "/api/v1/veo/record-info",
        }
    }
}

/// Unified task status returned to the frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub success: bool,
    pub state: String,
    pub result_urls: Option<Vec<String>>,
    pub data: Value,
}

/// Fold a raw KIE.AI status response into a [`TaskStatus`].
pub fn normalize_status(kind: TaskKind, upstream: &UpstreamResponse) -> TaskStatus {
    let raw = &upstream.body;
    let code_ok = match raw.get("code").and_then(|c| c.as_i64()) {
        Some(code) => code == 200,
        None => true,
    };
    let data = raw.get("data").cloned().unwrap_or(Value::Null);

    let (state, result_urls) = match kind {
        TaskKind::Video => {
            let state = match data.get("successFlag").and_then(|f| f.as_i64()) {
                Some(1) => "success",
                Some(0) => "generating",
                _ => "failed",
            };
            let urls = data
                .get("response")
                .and_then(|r| r.get("resultUrls"))
                .and_then(string_array);
            (state.to_string(), urls)
        }
        TaskKind::Image => {
            let state = data
                .get("state")
                .and_then(|s| s.as_str())
                .unwrap_or("unknown")
                .to_string();
            (state, parse_result_json(&data))
        }
    };

    TaskStatus {
        success: upstream.is_success() && code_ok,
        state,
        result_urls,
        data,
    }
}

/// `data.resultJson` is a JSON document encoded as a string.
fn parse_result_json(data: &Value) -> Option<Vec<String>> {
    let encoded = data.get("resultJson")?.as_str()?;
    let parsed: Value = serde_json::from_str(encoded).ok()?;
    parsed.get("resultUrls").and_then(string_array)
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    })
}

/// KIE.AI client bound to a configured API key.
pub struct KieClient {
    http: UpstreamClient,
    api_key: String,
    base_url: String,
}

impl KieClient {
    pub fn from_settings(http: UpstreamClient, settings: &KieSettings) -> Result<Self, UpstreamError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or(UpstreamError::NotConfigured("KIE.AI API key"))?;
        Ok(Self {
            http,
            api_key,
            base_url: settings.api_url.clone(),
        })
    }

    /// Forward a generation body verbatim.
    pub async fn generate(
        &self,
        endpoint: KieEndpoint,
        body: &Value,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let url = join_url(&self.base_url, endpoint.path());
        self.http
            .send_json(Method::POST, &url, &self.api_key, Some(body))
            .await
    }

    /// Fetch the raw status for a task.
    pub async fn record_info(
        &self,
        task_id: &str,
        kind: TaskKind,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let url = format!(
            "{}?taskId={}",
            join_url(&self.base_url, kind.status_path()),
            urlencoding::encode(task_id)
        );
        self.http
            .send_json(Method::GET, &url, &self.api_key, None)
            .await
    }
}
