//! Configuration commands.

use console::style;

use crate::cli::helpers::{arrow, failure, success};
use crate::config::{Config, Settings};

/// Print resolved settings. Secrets are reported as set or unset only.
pub fn cmd_config_show(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    match &config.source_path {
        Some(path) => println!("{} Config file: {}", arrow(), path.display()),
        None => println!("{} Config file: {}", arrow(), style("none (defaults and environment)").dim()),
    }

    println!();
    println!("{}", style("Local state").bold());
    println!("  Data directory: {}", settings.data_dir.display());
    println!("  Database:       {}", settings.database_url());

    println!();
    println!("{}", style("Endpoints").bold());
    println!("  KIE.AI:    {}", settings.kie.api_url);
    println!("  Seedream:  {}", settings.seedream.api_url);
    println!("  Kling:     {}", settings.kling.api_url);
    println!("  Rewriter:  {} ({})", settings.rewriter.endpoint, settings.rewriter.model);
    println!(
        "  Supabase:  {} (bucket {})",
        settings.supabase.url.as_deref().unwrap_or("-"),
        settings.supabase.bucket
    );
    println!(
        "  FTP:       {}:{} -> {}",
        settings.ftp.host.as_deref().unwrap_or("-"),
        settings.ftp.port,
        settings.ftp.base_url.as_deref().unwrap_or("-")
    );

    println!();
    println!("{}", style("Secrets").bold());
    for (name, present) in settings.presence() {
        let mark = if present { success() } else { failure() };
        println!("  {} {}", mark, name);
    }

    println!();
    println!(
        "  Batch: {} rows per page, {} ms between pages",
        settings.batch.batch_size, settings.batch.delay_ms
    );

    Ok(())
}
