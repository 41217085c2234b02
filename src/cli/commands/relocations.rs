//! Relocation log commands.

use std::sync::Arc;

use anyhow::Context;
use console::style;

use crate::cli::helpers::{arrow, open_db, success, warning};
use crate::config::Settings;
use crate::models::IntentState;
use crate::storage::{FileHost, FtpFileHost, ObjectStore, Relocator, SupabaseStorage};
use crate::upstream::UpstreamClient;

/// List recorded relocations.
pub async fn cmd_list(settings: &Settings, state: Option<&str>, limit: i64) -> anyhow::Result<()> {
    let state = match state {
        Some(s) => Some(
            IntentState::from_str(s)
                .ok_or_else(|| anyhow::anyhow!("Unknown state '{}'", s))?,
        ),
        None => None,
    };

    let ctx = open_db(settings).await?;
    let intents = ctx.relocations().list(state, limit).await?;
    if intents.is_empty() {
        println!("{} No relocations recorded", warning());
        return Ok(());
    }

    for intent in intents {
        let state = match intent.state {
            IntentState::Completed => style(intent.state.as_str()).green(),
            IntentState::Uploaded => style(intent.state.as_str()).yellow(),
            IntentState::Failed => style(intent.state.as_str()).red(),
            IntentState::Pending => style(intent.state.as_str()).cyan(),
        };
        println!(
            "{}  {:<9}  {}/{} -> {}",
            intent.created_at.format("%Y-%m-%d %H:%M"),
            state,
            intent.source_bucket,
            intent.source_key,
            intent.public_url
        );
        if let Some(err) = &intent.last_error {
            println!("    {} (attempts: {})", style(err).dim(), intent.attempts);
        }
    }
    Ok(())
}

/// Grace period before a pending move counts as stale. Negative means none.
fn grace_period(secs: i64) -> anyhow::Result<chrono::Duration> {
    chrono::Duration::try_seconds(secs.max(0)).context("--grace-secs is out of range")
}

/// Retry deletes and stale pending moves.
pub async fn cmd_resume(settings: &Settings, grace_secs: i64) -> anyhow::Result<()> {
    let http = UpstreamClient::new(settings)?;
    let source: Arc<dyn ObjectStore> = Arc::new(SupabaseStorage::new(
        http.inner().clone(),
        &settings.supabase.credentials()?,
    ));
    let host: Arc<dyn FileHost> = Arc::new(FtpFileHost::new(settings.ftp.credentials()?));
    let ctx = open_db(settings).await?;

    let grace = grace_period(grace_secs)?;

    println!("{} Resuming unfinished relocations", arrow());
    let relocator = Relocator::new(source, host, ctx.relocations());
    let report = relocator
        .resume(grace)
        .await?;

    println!(
        "{} {} examined, {} completed, {} still uploaded, {} failed",
        success(),
        report.examined,
        report.completed,
        report.still_uploaded,
        report.failed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grace_period_bounds() {
        assert_eq!(grace_period(300).unwrap(), chrono::Duration::seconds(300));
        assert_eq!(grace_period(-5).unwrap(), chrono::Duration::zero());
        assert!(grace_period(i64::MAX).is_err());
    }
}
