//! Community prompt batch commands.

use std::collections::HashMap;

use console::style;

use crate::cli::helpers::{arrow, failure, open_db, pacing, prompt_store, success, truncate, warning};
use crate::config::Settings;
use crate::prompts::rewrite::{rewrite_prompts, RewriteOptions};
use crate::prompts::runner::{Preview, PreviewChange};
use crate::prompts::{scan, transforms, PromptRewriter, RewriteMode, RunOptions, TransformRunner};
use crate::upstream::UpstreamClient;

/// Arguments for `prompts apply`.
pub struct ApplyArgs {
    pub dry_run: bool,
    pub force: bool,
    pub batch_size: Option<usize>,
    pub delay_ms: Option<u64>,
    pub preview: usize,
}

/// Print would-be changes as `-`/`+` pairs per field.
fn print_previews(previews: &[Preview]) {
    for preview in previews {
        println!("  #{}", preview.id);
        for change in &preview.changes {
            match change {
                PreviewChange::Field {
                    field,
                    before,
                    after,
                } => {
                    println!("    {}:", field.as_str());
                    println!("      {} {}", style("-").red(), truncate(before, 100));
                    println!("      {} {}", style("+").green(), truncate(after, 100));
                }
                PreviewChange::Deactivate => {
                    println!("    {}", style("deactivate").yellow());
                }
            }
        }
    }
}

/// List registered transforms with their applied state.
pub async fn cmd_transforms(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_db(settings).await?;
    let applied: HashMap<(String, i32), _> = ctx
        .transform_log()
        .get_all()
        .await?
        .into_iter()
        .map(|a| ((a.name.clone(), a.version), a))
        .collect();

    for transform in transforms::registry()? {
        let key = (transform.name().to_string(), transform.version());
        let status = match applied.get(&key) {
            Some(a) => format!(
                "{} applied {} ({} changed, {} deactivated)",
                success(),
                a.applied_at.format("%Y-%m-%d %H:%M"),
                a.rows_changed,
                a.rows_deactivated
            ),
            None => format!("{} not applied", style("·").dim()),
        };
        println!(
            "{} v{}  {}",
            style(transform.name()).bold(),
            transform.version(),
            status
        );
        println!("    {}", style(transform.description()).dim());
    }
    Ok(())
}

/// Run one transform over the table.
pub async fn cmd_apply(settings: &Settings, name: &str, args: ApplyArgs) -> anyhow::Result<()> {
    let transform = transforms::find(name)?;
    let store = prompt_store(settings)?;
    let ctx = open_db(settings).await?;

    let options = RunOptions {
        dry_run: args.dry_run,
        force: args.force,
        batch_size: args.batch_size.unwrap_or(settings.batch.batch_size),
        delay: pacing(settings, args.delay_ms),
        preview_limit: args.preview,
        show_progress: true,
    };

    println!(
        "{} {} v{}{}",
        arrow(),
        transform.name(),
        transform.version(),
        if options.dry_run { " (dry run)" } else { "" }
    );

    let runner = TransformRunner::new(store.as_ref(), ctx.transform_log());
    let report = runner.run(&transform, &options).await?;

    if report.already_applied {
        println!(
            "{} Already applied. Use --force to run again.",
            warning()
        );
        return Ok(());
    }

    print_previews(&report.previews);

    for rejection in &report.rejections {
        println!(
            "  {} #{} {}: {}",
            failure(),
            rejection.id,
            rejection.field.as_str(),
            rejection.reason
        );
    }

    let counts = report.counts;
    println!(
        "{} {} scanned, {} changed, {} deactivated, {} skipped",
        if report.dry_run { arrow() } else { success() },
        counts.scanned,
        counts.changed,
        counts.deactivated,
        counts.skipped
    );
    if report.dry_run {
        println!("  Dry run: nothing written.");
    }
    Ok(())
}

/// Report rows that break the content rules.
pub async fn cmd_scan(settings: &Settings, batch_size: Option<usize>) -> anyhow::Result<()> {
    let store = prompt_store(settings)?;
    let report = scan::scan(
        store.as_ref(),
        batch_size.unwrap_or(settings.batch.batch_size),
    )
    .await?;

    for finding in &report.findings {
        println!(
            "  {} #{} {}: {}",
            warning(),
            finding.id,
            finding.field.as_str(),
            finding.violation
        );
    }

    let mark = if report.findings.is_empty() {
        success()
    } else {
        failure()
    };
    println!(
        "{} {} rows scanned ({} inactive), {} findings",
        mark,
        report.scanned,
        report.inactive,
        report.findings.len()
    );
    Ok(())
}

/// Rewrite active prompts with the configured model.
pub async fn cmd_rewrite(
    settings: &Settings,
    mode: RewriteMode,
    dry_run: bool,
    limit: usize,
    delay_ms: Option<u64>,
) -> anyhow::Result<()> {
    let store = prompt_store(settings)?;
    let http = UpstreamClient::new(settings)?;
    let rewriter = PromptRewriter::new(http.inner().clone(), &settings.rewriter)?;

    let options = RewriteOptions {
        mode,
        dry_run,
        limit,
        batch_size: settings.batch.batch_size,
        delay: pacing(settings, delay_ms),
    };

    println!(
        "{} Rewriting prompts ({:?}){}",
        arrow(),
        mode,
        if dry_run { ", dry run" } else { "" }
    );
    let report = rewrite_prompts(store.as_ref(), &rewriter, &options).await?;
    print_previews(&report.previews);

    println!(
        "{} {} scanned, {} rewritten, {} unchanged, {} rejected, {} failed",
        success(),
        report.scanned,
        report.rewritten,
        report.unchanged,
        report.rejected,
        report.failed
    );
    Ok(())
}
