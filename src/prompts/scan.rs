//! Report rows that currently break the content rules.

use tracing::info;

use super::store::{PromptStore, PromptStoreError};
use super::validate::{self, Violation};
use crate::models::PromptField;

#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub id: i64,
    pub field: PromptField,
    pub violation: Violation,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub scanned: usize,
    pub inactive: usize,
    pub findings: Vec<Finding>,
}

/// Check every active row. Read-only.
pub async fn scan(store: &dyn PromptStore, batch_size: usize) -> Result<ScanReport, PromptStoreError> {
    let batch_size = batch_size.max(1);
    let mut report = ScanReport::default();
    let mut offset = 0;

    loop {
        let page = store.fetch_page(offset, batch_size).await?;
        for row in &page {
            report.scanned += 1;
            if !row.is_active {
                report.inactive += 1;
                continue;
            }
            for field in PromptField::ALL {
                if let Err(violation) = validate::check(row.field(field)) {
                    report.findings.push(Finding {
                        id: row.id,
                        field,
                        violation,
                    });
                }
            }
        }
        offset += page.len();
        if page.len() < batch_size {
            break;
        }
    }

    info!(
        "Scanned {} rows ({} inactive), {} findings",
        report.scanned,
        report.inactive,
        report.findings.len()
    );
    Ok(report)
}
