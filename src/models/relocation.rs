//! Relocation intents: the durable record of a Storage -> FTP move.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress of one relocation.
///
/// `Pending` -> `Uploaded` -> `Completed`, or `Pending` -> `Failed`.
/// An intent left in `Uploaded` has a public copy while the Storage original
/// still exists; resuming retries only the delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    Pending,
    Uploaded,
    Completed,
    Failed,
}

impl IntentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploaded => "uploaded",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "uploaded" => Some(Self::Uploaded),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// No further work will be attempted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for IntentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded relocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelocationIntent {
    pub id: String,
    pub source_bucket: String,
    pub source_key: String,
    pub username: String,
    pub filename: String,
    pub remote_dir: String,
    pub public_url: String,
    pub state: IntentState,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RelocationIntent {
    /// A fresh pending intent.
    pub fn new(
        source_bucket: &str,
        source_key: &str,
        username: &str,
        filename: &str,
        remote_dir: &str,
        public_url: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_bucket: source_bucket.to_string(),
            source_key: source_key.to_string(),
            username: username.to_string(),
            filename: filename.to_string(),
            remote_dir: remote_dir.to_string(),
            public_url: public_url.to_string(),
            state: IntentState::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
