//! Runs a transform over `community_prompts` page by page.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::store::{PromptStore, PromptStoreError};
use super::transforms::Transform;
use super::validate::{self, Violation};
use crate::models::PromptField;
use crate::repository::{DieselError, DieselTransformLogRepository, RunCounts};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] PromptStoreError),

    #[error("Transform log error: {0}")]
    Log(#[from] DieselError),
}

/// Options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Run even if this transform version is already recorded.
    pub force: bool,
    pub batch_size: usize,
    /// Pause between pages.
    pub delay: Duration,
    /// Rows to keep for the dry-run preview.
    pub preview_limit: usize,
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            force: false,
            batch_size: 100,
            delay: Duration::from_millis(500),
            preview_limit: 20,
            show_progress: false,
        }
    }
}

/// One change shown in a preview.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewChange {
    Field {
        field: PromptField,
        before: String,
        after: String,
    },
    Deactivate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub id: i64,
    pub changes: Vec<PreviewChange>,
}

/// A row the runner refused to write.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub id: i64,
    pub field: PromptField,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// A second application would change the output again.
    NotIdempotent,
    Invalid(Violation),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotIdempotent => f.write_str("transform is not idempotent on this row"),
            Self::Invalid(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub name: String,
    pub version: i32,
    pub dry_run: bool,
    /// The run was skipped because this version was already applied.
    pub already_applied: bool,
    pub counts: RunCounts,
    pub previews: Vec<Preview>,
    pub rejections: Vec<Rejection>,
}

pub struct TransformRunner<'a> {
    store: &'a dyn PromptStore,
    log: DieselTransformLogRepository,
}

impl<'a> TransformRunner<'a> {
    pub fn new(store: &'a dyn PromptStore, log: DieselTransformLogRepository) -> Self {
        Self { store, log }
    }

    pub async fn run(
        &self,
        transform: &Transform,
        options: &RunOptions,
    ) -> Result<RunReport, RunError> {
        let mut report = RunReport {
            name: transform.name().to_string(),
            version: transform.version(),
            dry_run: options.dry_run,
            ..Default::default()
        };

        if !options.dry_run
            && !options.force
            && self
                .log
                .is_applied(transform.name(), transform.version())
                .await?
        {
            info!(
                "{} v{} already applied, skipping",
                transform.name(),
                transform.version()
            );
            report.already_applied = true;
            return Ok(report);
        }

        let pb = if options.show_progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {pos} rows {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(format!("{} v{}", transform.name(), transform.version()));

        let batch_size = options.batch_size.max(1);
        let mut offset = 0;
        loop {
            let page = self.store.fetch_page(offset, batch_size).await?;
            debug!("Page at offset {}: {} rows", offset, page.len());
            if page.is_empty() {
                break;
            }

            for row in &page {
                report.counts.scanned += 1;
                pb.inc(1);

                let plan = transform.plan(row);
                if plan.is_noop() {
                    continue;
                }

                let rejected = plan.changed.iter().find_map(|&field| {
                    let after = plan.patch.get(field).unwrap_or_default();
                    if !transform.is_idempotent_on(after) {
                        Some((field, RejectReason::NotIdempotent))
                    } else {
                        validate::check(after)
                            .err()
                            .map(|v| (field, RejectReason::Invalid(v)))
                    }
                });
                if let Some((field, reason)) = rejected {
                    warn!("Skipping row {} ({}): {}", row.id, field.as_str(), reason);
                    report.counts.skipped += 1;
                    report.rejections.push(Rejection {
                        id: row.id,
                        field,
                        reason,
                    });
                    continue;
                }

                if options.dry_run {
                    if report.previews.len() < options.preview_limit {
                        report.previews.push(preview_of(row, &plan));
                    }
                } else {
                    self.store.update(row.id, &plan.patch).await?;
                }

                if plan.deactivates() {
                    report.counts.deactivated += 1;
                } else {
                    report.counts.changed += 1;
                }
            }

            offset += page.len();
            if page.len() < batch_size {
                break;
            }
            tokio::time::sleep(options.delay).await;
        }
        pb.finish_and_clear();

        if !options.dry_run {
            self.log
                .record(transform.name(), transform.version(), report.counts)
                .await?;
        }

        info!(
            "{} v{}: {} scanned, {} changed, {} deactivated, {} skipped{}",
            transform.name(),
            transform.version(),
            report.counts.scanned,
            report.counts.changed,
            report.counts.deactivated,
            report.counts.skipped,
            if options.dry_run { " (dry run)" } else { "" }
        );
        Ok(report)
    }
}

fn preview_of(row: &crate::models::CommunityPrompt, plan: &super::transforms::RowPlan) -> Preview {
    let mut changes: Vec<PreviewChange> = plan
        .changed
        .iter()
        .map(|&field| PreviewChange::Field {
            field,
            before: row.field(field).to_string(),
            after: plan.patch.get(field).unwrap_or_default().to_string(),
        })
        .collect();
    if plan.deactivates() {
        changes.push(PreviewChange::Deactivate);
    }
    Preview {
        id: row.id,
        changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::store::{prompt, MemoryPromptStore};
    use crate::prompts::transforms::find;
    use crate::repository::DieselDbContext;
    use tempfile::tempdir;

    fn fast(dry_run: bool) -> RunOptions {
        RunOptions {
            dry_run,
            batch_size: 2,
            delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn fixture() -> MemoryPromptStore {
        MemoryPromptStore::new(vec![
            prompt(1, "Portrait", "a man in a hat"),
            prompt(2, "Boy", "his dog"),
            prompt(3, "Sky", "clouds"),
            prompt(4, "Ghost", "NO_CHANGE"),
            prompt(5, "King", "the king and his son"),
        ])
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let ctx = DieselDbContext::from_path(&dir.path().join("t.db"));
        ctx.init_schema().await.unwrap();
        let store = fixture();
        let runner = TransformRunner::new(&store, ctx.transform_log());
        let t = find("gender-male-to-female").unwrap();

        let report = runner.run(&t, &fast(true)).await.unwrap();
        assert_eq!(report.counts.scanned, 5);
        assert_eq!(report.counts.changed, 3);
        assert_eq!(report.previews.len(), 3);
        assert_eq!(store.update_count(), 0);
        assert!(!ctx.transform_log().is_applied(t.name(), 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_real_run_then_guard() {
        let dir = tempdir().unwrap();
        let ctx = DieselDbContext::from_path(&dir.path().join("t.db"));
        ctx.init_schema().await.unwrap();
        let store = fixture();
        let runner = TransformRunner::new(&store, ctx.transform_log());
        let t = find("gender-male-to-female").unwrap();

        let report = runner.run(&t, &fast(false)).await.unwrap();
        assert_eq!(report.counts.changed, 3);
        let rows = store.rows();
        assert_eq!(rows[0].prompt, "a woman in a hat");
        assert_eq!(rows[1].title, "Girl");
        assert_eq!(rows[4].prompt, "the queen and her daughter");

        let again = runner.run(&t, &fast(false)).await.unwrap();
        assert!(again.already_applied);
        assert_eq!(again.counts.scanned, 0);

        // Forcing re-runs, and the clean data needs nothing.
        let forced = runner
            .run(
                &t,
                &RunOptions {
                    force: true,
                    ..fast(false)
                },
            )
            .await
            .unwrap();
        assert_eq!(forced.counts.scanned, 5);
        assert_eq!(forced.counts.changed, 0);
    }

    #[tokio::test]
    async fn test_sentinel_rows_deactivated() {
        let dir = tempdir().unwrap();
        let ctx = DieselDbContext::from_path(&dir.path().join("t.db"));
        ctx.init_schema().await.unwrap();
        let store = fixture();
        let runner = TransformRunner::new(&store, ctx.transform_log());
        let t = find("strip-no-change-sentinel").unwrap();

        let report = runner.run(&t, &fast(false)).await.unwrap();
        assert_eq!(report.counts.deactivated, 1);
        let ghost = store.rows().into_iter().find(|r| r.id == 4).unwrap();
        assert!(!ghost.is_active);
        assert_eq!(ghost.prompt, "NO_CHANGE");
    }

    #[tokio::test]
    async fn test_invalid_output_is_skipped() {
        let dir = tempdir().unwrap();
        let ctx = DieselDbContext::from_path(&dir.path().join("t.db"));
        ctx.init_schema().await.unwrap();
        let store = MemoryPromptStore::new(vec![prompt(1, "Man", "a man NO_CHANGE")]);
        let runner = TransformRunner::new(&store, ctx.transform_log());
        let t = find("gender-male-to-female").unwrap();

        let report = runner.run(&t, &fast(false)).await.unwrap();
        assert_eq!(report.counts.skipped, 1);
        assert_eq!(report.rejections[0].reason, RejectReason::Invalid(Violation::Sentinel));
        assert_eq!(store.update_count(), 0);
    }
}
