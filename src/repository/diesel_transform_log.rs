//! Log of prompt transforms applied to `community_prompts` (SQLite).
//!
//! A `(name, version)` pair is recorded once a real run finishes, which is
//! what lets the runner refuse to apply the same transform twice.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_models::{AppliedTransformRecord, NewAppliedTransform};
use super::diesel_pool::{AsyncSqlitePool, DieselError};
use super::util::{format_datetime, parse_datetime, to_diesel_error};
use crate::schema::applied_transforms;

/// A completed transform run.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedTransform {
    pub name: String,
    pub version: i32,
    pub applied_at: DateTime<Utc>,
    pub rows_scanned: i32,
    pub rows_changed: i32,
    pub rows_deactivated: i32,
    pub rows_skipped: i32,
}

impl From<AppliedTransformRecord> for AppliedTransform {
    fn from(record: AppliedTransformRecord) -> Self {
        AppliedTransform {
            name: record.name,
            version: record.version,
            applied_at: parse_datetime(&record.applied_at),
            rows_scanned: record.rows_scanned,
            rows_changed: record.rows_changed,
            rows_deactivated: record.rows_deactivated,
            rows_skipped: record.rows_skipped,
        }
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub scanned: usize,
    pub changed: usize,
    pub deactivated: usize,
    pub skipped: usize,
}

/// Row counts are stored as INTEGER columns mapped to `i32`.
fn count_column(n: usize) -> Result<i32, DieselError> {
    i32::try_from(n).map_err(|_| to_diesel_error(format!("row count {} does not fit the log", n)))
}

#[derive(Clone)]
pub struct DieselTransformLogRepository {
    pool: AsyncSqlitePool,
}

impl DieselTransformLogRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Check if this transform version already ran.
    pub async fn is_applied(&self, name: &str, version: i32) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = applied_transforms::table
            .filter(applied_transforms::name.eq(name))
            .filter(applied_transforms::version.eq(version))
            .select(count_star())
            .first(&mut conn)
            .await?;

        Ok(count > 0)
    }

    /// Record a finished run.
    pub async fn record(
        &self,
        name: &str,
        version: i32,
        counts: RunCounts,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let now = format_datetime(Utc::now());

        let entry = NewAppliedTransform {
            name,
            version,
            applied_at: &now,
            rows_scanned: count_column(counts.scanned)?,
            rows_changed: count_column(counts.changed)?,
            rows_deactivated: count_column(counts.deactivated)?,
            rows_skipped: count_column(counts.skipped)?,
        };

        diesel::insert_into(applied_transforms::table)
            .values(&entry)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Every recorded run, most recent first.
    pub async fn get_all(&self) -> Result<Vec<AppliedTransform>, DieselError> {
        let mut conn = self.pool.get().await?;

        applied_transforms::table
            .order(applied_transforms::applied_at.desc())
            .load::<AppliedTransformRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(AppliedTransform::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::diesel_context::DieselDbContext;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_record_and_check() {
        let dir = tempdir().unwrap();
        let ctx = DieselDbContext::from_path(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        let repo = ctx.transform_log();

        assert!(!repo.is_applied("normalize-whitespace", 1).await.unwrap());

        let counts = RunCounts {
            scanned: 10,
            changed: 3,
            deactivated: 0,
            skipped: 1,
        };
        repo.record("normalize-whitespace", 1, counts).await.unwrap();

        assert!(repo.is_applied("normalize-whitespace", 1).await.unwrap());
        assert!(!repo.is_applied("normalize-whitespace", 2).await.unwrap());

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].rows_changed, 3);
        assert_eq!(all[0].rows_skipped, 1);
    }

    #[test]
    fn test_count_column_overflow() {
        assert_eq!(count_column(42).unwrap(), 42);
        assert!(count_column(i32::MAX as usize + 1).is_err());
    }
}
