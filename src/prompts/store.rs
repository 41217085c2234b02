//! Access to the `community_prompts` table.
//!
//! Production goes through Supabase's PostgREST endpoint; tests use
//! [`MemoryPromptStore`].

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::SupabaseCredentials;
use crate::models::{CommunityPrompt, PromptPatch};

const TABLE_PATH: &str = "/rest/v1/community_prompts";

#[derive(Debug, Error)]
pub enum PromptStoreError {
    #[error("Prompt store connection failed: {0}")]
    Connection(String),

    #[error("Prompt store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse prompt rows: {0}")]
    Parse(String),
}

#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Rows ordered by id, `limit` rows starting at `offset`.
    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CommunityPrompt>, PromptStoreError>;

    /// Apply a partial update to one row.
    async fn update(&self, id: i64, patch: &PromptPatch) -> Result<(), PromptStoreError>;

    /// Active rows, most liked first.
    async fn list_active(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CommunityPrompt>, PromptStoreError>;
}

/// PostgREST-backed store.
#[derive(Clone)]
pub struct SupabasePromptStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabasePromptStore {
    pub fn new(client: Client, credentials: &SupabaseCredentials) -> Self {
        Self {
            client,
            base_url: credentials.url.clone(),
            service_key: credentials.service_key.clone(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}{}", self.base_url, TABLE_PATH)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn load_rows(
        &self,
        query: &[(&str, String)],
    ) -> Result<Vec<CommunityPrompt>, PromptStoreError> {
        let resp = self
            .authorized(self.client.get(self.table_url()))
            .query(query)
            .send()
            .await
            .map_err(|e| PromptStoreError::Connection(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(PromptStoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<Vec<CommunityPrompt>>()
            .await
            .map_err(|e| PromptStoreError::Parse(e.to_string()))
    }
}

#[async_trait]
impl PromptStore for SupabasePromptStore {
    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CommunityPrompt>, PromptStoreError> {
        debug!("Fetching prompts {}..{}", offset, offset + limit);
        self.load_rows(&[
            ("select", "*".to_string()),
            ("order", "id.asc".to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
        ])
        .await
    }

    async fn update(&self, id: i64, patch: &PromptPatch) -> Result<(), PromptStoreError> {
        let resp = self
            .authorized(self.client.patch(self.table_url()))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await
            .map_err(|e| PromptStoreError::Connection(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(PromptStoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    async fn list_active(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CommunityPrompt>, PromptStoreError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("is_active", "eq.true".to_string()),
            ("order", "likes.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(category) = category {
            query.push(("category", format!("eq.{}", category)));
        }
        self.load_rows(&query).await
    }
}

/// In-memory store, used by tests and dry runs against fixtures.
#[derive(Default)]
pub struct MemoryPromptStore {
    rows: std::sync::Mutex<Vec<CommunityPrompt>>,
    updates: std::sync::atomic::AtomicUsize,
}

impl MemoryPromptStore {
    pub fn new(mut rows: Vec<CommunityPrompt>) -> Self {
        rows.sort_by_key(|r| r.id);
        Self {
            rows: std::sync::Mutex::new(rows),
            updates: Default::default(),
        }
    }

    pub fn rows(&self) -> Vec<CommunityPrompt> {
        self.lock().clone()
    }

    /// Number of `update` calls made.
    pub fn update_count(&self) -> usize {
        self.updates.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CommunityPrompt>> {
        // A poisoned lock only means a panicking test; the data is still usable.
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PromptStore for MemoryPromptStore {
    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CommunityPrompt>, PromptStoreError> {
        Ok(self.lock().iter().skip(offset).take(limit).cloned().collect())
    }

    async fn update(&self, id: i64, patch: &PromptPatch) -> Result<(), PromptStoreError> {
        self.updates
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut rows = self.lock();
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| PromptStoreError::Api {
                status: 404,
                message: format!("no row with id {}", id),
            })?;
        if let Some(title) = &patch.title {
            row.title = title.clone();
        }
        if let Some(prompt) = &patch.prompt {
            row.prompt = prompt.clone();
        }
        if let Some(active) = patch.is_active {
            row.is_active = active;
        }
        Ok(())
    }

    async fn list_active(
        &self,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CommunityPrompt>, PromptStoreError> {
        let mut rows: Vec<_> = self
            .lock()
            .iter()
            .filter(|r| r.is_active)
            .filter(|r| category.map_or(true, |c| r.category.as_deref() == Some(c)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.likes.cmp(&a.likes));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
pub(crate) fn prompt(id: i64, title: &str, text: &str) -> CommunityPrompt {
    CommunityPrompt {
        id,
        title: title.to_string(),
        prompt: text.to_string(),
        category: None,
        likes: 0,
        author: None,
        image_url: None,
        source_url: None,
        is_active: true,
        created_at: None,
        updated_at: None,
    }
}
