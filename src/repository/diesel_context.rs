//! Diesel database context for the local state database.
//!
//! Holds the connection factory and hands out repositories. Create one per
//! command or server, then use it for all local state access.

use std::path::Path;

use diesel_async::SimpleAsyncConnection;

use super::diesel_pool::{AsyncSqlitePool, DieselError};
use super::diesel_relocation::DieselRelocationRepository;
use super::diesel_transform_log::DieselTransformLogRepository;

/// Local state database context.
///
/// # Example
/// ```ignore
/// let ctx = DieselDbContext::new(&settings.database_url());
/// ctx.init_schema().await?;
/// let pending = ctx.relocations().list(Some(IntentState::Pending), 50).await?;
/// ```
#[derive(Clone)]
pub struct DieselDbContext {
    pool: AsyncSqlitePool,
}

impl DieselDbContext {
    /// Create a context from a database URL (`sqlite:` prefix optional).
    pub fn new(database_url: &str) -> Self {
        Self {
            pool: AsyncSqlitePool::new(database_url),
        }
    }

    /// Create a context from a file path.
    pub fn from_path(db_path: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
        }
    }

    /// Get a relocation intent repository.
    pub fn relocations(&self) -> DieselRelocationRepository {
        DieselRelocationRepository::new(self.pool.clone())
    }

    /// Get a transform log repository.
    pub fn transform_log(&self) -> DieselTransformLogRepository {
        DieselTransformLogRepository::new(self.pool.clone())
    }

    /// Create the local tables if they don't exist.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(
            r#"
            -- Storage -> FTP moves
            CREATE TABLE IF NOT EXISTS relocation_intents (
                id TEXT PRIMARY KEY,
                source_bucket TEXT NOT NULL,
                source_key TEXT NOT NULL,
                username TEXT NOT NULL,
                filename TEXT NOT NULL,
                remote_dir TEXT NOT NULL,
                public_url TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_relocation_intents_state
                ON relocation_intents(state, updated_at);

            -- Prompt transform runs
            CREATE TABLE IF NOT EXISTS applied_transforms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                version INTEGER NOT NULL,
                applied_at TEXT NOT NULL,
                rows_scanned INTEGER NOT NULL DEFAULT 0,
                rows_changed INTEGER NOT NULL DEFAULT 0,
                rows_deactivated INTEGER NOT NULL DEFAULT 0,
                rows_skipped INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_applied_transforms_name
                ON applied_transforms(name, version);
            "#,
        )
        .await
    }
}
