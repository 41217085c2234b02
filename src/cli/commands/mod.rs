//! CLI parser and dispatch to command-specific modules.

mod config_cmd;
mod db;
mod prompts;
mod relocations;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::load_settings;
use crate::prompts::RewriteMode;

#[derive(Parser)]
#[command(name = "genfriends")]
#[command(about = "AI generation proxy and community prompt tooling")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Address to bind (host:port, host, or port)
        #[arg(short, long, default_value = "127.0.0.1:3000")]
        bind: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Local database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Batch tooling for community prompts
    Prompts {
        #[command(subcommand)]
        command: PromptsCommands,
    },

    /// Storage to FTP relocation log
    Relocations {
        #[command(subcommand)]
        command: RelocationsCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show resolved settings (secrets shown as set/unset)
    Show,
}

#[derive(Subcommand)]
enum DbCommands {
    /// Create the local SQLite schema
    Init,
    /// Print Postgres DDL for the Supabase tables
    Sql,
}

#[derive(Subcommand)]
enum PromptsCommands {
    /// List available transforms and whether each has been applied
    Transforms,

    /// Apply a named transform to every row
    Apply {
        /// Transform name (see `prompts transforms`)
        name: String,
        /// Compute changes without writing
        #[arg(long)]
        dry_run: bool,
        /// Run even if this version was already applied
        #[arg(long)]
        force: bool,
        /// Rows per page
        #[arg(long)]
        batch_size: Option<usize>,
        /// Pause between pages in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Number of changed rows to preview in a dry run
        #[arg(long, default_value = "20")]
        preview: usize,
    },

    /// Report rows that break the content rules
    Scan {
        /// Rows per page
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Rewrite active prompts with an LLM
    Rewrite {
        /// Rewrite mode
        #[arg(long, value_enum)]
        mode: RewriteMode,
        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Stop after this many rows (0 = no limit)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Pause between model calls in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },
}

#[derive(Subcommand)]
enum RelocationsCommands {
    /// List recorded relocations, newest first
    List {
        /// Filter by state (pending, uploaded, completed, failed)
        #[arg(long)]
        state: Option<String>,
        /// Maximum rows to show
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },

    /// Finish interrupted relocations
    Resume {
        /// Leave pending intents younger than this alone (seconds)
        #[arg(long, default_value = "300")]
        grace_secs: i64,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (settings, config) = load_settings(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Serve { bind } => serve::cmd_serve(settings, &bind).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => config_cmd::cmd_config_show(&settings, &config),
        },
        Commands::Db { command } => match command {
            DbCommands::Init => db::cmd_db_init(&settings).await,
            DbCommands::Sql => db::cmd_db_sql(),
        },
        Commands::Prompts { command } => match command {
            PromptsCommands::Transforms => prompts::cmd_transforms(&settings).await,
            PromptsCommands::Apply {
                name,
                dry_run,
                force,
                batch_size,
                delay_ms,
                preview,
            } => {
                let options = prompts::ApplyArgs {
                    dry_run,
                    force,
                    batch_size,
                    delay_ms,
                    preview,
                };
                prompts::cmd_apply(&settings, &name, options).await
            }
            PromptsCommands::Scan { batch_size } => {
                prompts::cmd_scan(&settings, batch_size).await
            }
            PromptsCommands::Rewrite {
                mode,
                dry_run,
                limit,
                delay_ms,
            } => prompts::cmd_rewrite(&settings, mode, dry_run, limit, delay_ms).await,
        },
        Commands::Relocations { command } => match command {
            RelocationsCommands::List { state, limit } => {
                relocations::cmd_list(&settings, state.as_deref(), limit).await
            }
            RelocationsCommands::Resume { grace_secs } => {
                relocations::cmd_resume(&settings, grace_secs).await
            }
        },
    }
}
