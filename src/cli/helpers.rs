//! Shared helpers for CLI commands.

use std::sync::Arc;
use std::time::Duration;

use console::{style, StyledObject};

use crate::config::Settings;
use crate::prompts::{PromptStore, SupabasePromptStore};
use crate::repository::DieselDbContext;
use crate::upstream::UpstreamClient;

pub fn success() -> StyledObject<&'static str> {
    style("✓").green()
}

pub fn failure() -> StyledObject<&'static str> {
    style("✗").red()
}

pub fn warning() -> StyledObject<&'static str> {
    style("!").yellow()
}

pub fn arrow() -> StyledObject<&'static str> {
    style("→").cyan()
}

/// Open the local database, creating the schema if needed.
pub async fn open_db(settings: &Settings) -> anyhow::Result<DieselDbContext> {
    settings.ensure_directories()?;
    let ctx = DieselDbContext::new(&settings.database_url());
    ctx.init_schema().await?;
    Ok(ctx)
}

/// Supabase-backed prompt store from settings.
pub fn prompt_store(settings: &Settings) -> anyhow::Result<Arc<dyn PromptStore>> {
    let credentials = settings.supabase.credentials()?;
    let http = UpstreamClient::new(settings)?;
    Ok(Arc::new(SupabasePromptStore::new(
        http.inner().clone(),
        &credentials,
    )))
}

/// Pacing delay from an optional override, falling back to settings.
pub fn pacing(settings: &Settings, delay_ms: Option<u64>) -> Duration {
    Duration::from_millis(delay_ms.unwrap_or(settings.batch.delay_ms))
}

/// Shorten text for one-line display.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let cut: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut)
}
