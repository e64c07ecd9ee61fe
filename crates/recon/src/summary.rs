use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{is_numeric_key, ComparisonResult, FileSide};
use crate::plan::{HighlightCategory, HighlightPlan};

/// Row counts for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub records: usize,
    pub missing_rows: usize,
    pub mismatched_rows: usize,
    pub duplicated_rows: usize,
    pub price_anomaly_rows: usize,
}

impl FileSummary {
    pub fn rows(&self, category: HighlightCategory) -> usize {
        match category {
            HighlightCategory::Missing => self.missing_rows,
            HighlightCategory::Mismatched => self.mismatched_rows,
            HighlightCategory::Duplicated => self.duplicated_rows,
            HighlightCategory::PriceAnomaly => self.price_anomaly_rows,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonSummary {
    pub file_a: FileSummary,
    pub file_b: FileSummary,
    pub mismatched_keys: usize,
    pub duplicate_entries: usize,
    /// Distinct numeric invoice keys among duplicate entries.
    pub duplicate_invoices: usize,
    pub price_anomalies: usize,
}

impl ComparisonSummary {
    pub fn file(&self, side: FileSide) -> &FileSummary {
        match side {
            FileSide::A => &self.file_a,
            FileSide::B => &self.file_b,
        }
    }

    pub fn has_findings(&self) -> bool {
        [&self.file_a, &self.file_b].iter().any(|f| {
            HighlightCategory::ALL
                .iter()
                .any(|c| f.rows(*c) > 0)
        })
    }
}

/// Compute summary counts from a result and the two per-file plans.
pub fn compute_summary(
    result: &ComparisonResult,
    records_a: usize,
    records_b: usize,
    plan_a: &HighlightPlan,
    plan_b: &HighlightPlan,
) -> ComparisonSummary {
    let duplicate_invoices: BTreeSet<&str> = result
        .duplicated
        .iter()
        .map(|d| d.key.as_str())
        .filter(|k| is_numeric_key(k))
        .collect();

    ComparisonSummary {
        file_a: file_summary(records_a, plan_a),
        file_b: file_summary(records_b, plan_b),
        mismatched_keys: result.mismatched.len(),
        duplicate_entries: result.duplicated.len(),
        duplicate_invoices: duplicate_invoices.len(),
        price_anomalies: result.price_anomalies.len(),
    }
}

fn file_summary(records: usize, plan: &HighlightPlan) -> FileSummary {
    FileSummary {
        records,
        missing_rows: plan.count(HighlightCategory::Missing),
        mismatched_rows: plan.count(HighlightCategory::Mismatched),
        duplicated_rows: plan.count(HighlightCategory::Duplicated),
        price_anomaly_rows: plan.count(HighlightCategory::PriceAnomaly),
    }
}
