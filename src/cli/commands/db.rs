//! Database management commands.

use crate::cli::helpers::{arrow, open_db, success};
use crate::config::Settings;
use crate::prompts::ddl;

/// Create the local schema.
pub async fn cmd_db_init(settings: &Settings) -> anyhow::Result<()> {
    println!("{} Initializing {}", arrow(), settings.database_url());
    open_db(settings).await?;
    println!("  {} Database ready", success());
    Ok(())
}

/// Print the Postgres DDL for the hosted tables.
pub fn cmd_db_sql() -> anyhow::Result<()> {
    for (table, sql) in ddl::all() {
        println!("-- {}", table);
        println!("{}", sql.trim());
        println!();
    }
    Ok(())
}
