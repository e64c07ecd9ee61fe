use crate::config::CompareConfig;
use crate::error::ReconError;
use crate::index::build_index;
use crate::model::{Comparison, ComparisonMeta, FileSide, RawRow};
use crate::normalize::{normalize_rows, SellerExclusions};
use crate::plan::HighlightPlan;
use crate::reconcile::{reconcile, ReconcileOptions};
use crate::summary::compute_summary;

/// Validate both files' settings, then normalize, index and reconcile.
///
/// Configuration errors are reported before any row is touched, file A first.
pub fn compare(
    config: &CompareConfig,
    rows_a: &[RawRow],
    rows_b: &[RawRow],
) -> Result<Comparison, ReconError> {
    let columns_a = config
        .file(FileSide::A)
        .resolve(FileSide::A, rows_a, config.compare_net_price)?;
    let columns_b = config
        .file(FileSide::B)
        .resolve(FileSide::B, rows_b, config.compare_net_price)?;

    let exclusions = SellerExclusions::new(&config.excluded_sellers);
    let records_a = normalize_rows(rows_a, &columns_a, &exclusions);
    let records_b = normalize_rows(rows_b, &columns_b, &exclusions);
    log::debug!(
        "normalized {} of {} rows in file A, {} of {} rows in file B",
        records_a.len(),
        rows_a.len().saturating_sub(columns_a.start_row),
        records_b.len(),
        rows_b.len().saturating_sub(columns_b.start_row),
    );

    let index_a = build_index(&records_a);
    let index_b = build_index(&records_b);
    let result = reconcile(
        &index_a,
        &index_b,
        &records_a,
        &records_b,
        ReconcileOptions {
            compare_net_price: config.compare_net_price,
        },
    );

    let plan_a = HighlightPlan::from_result(&result, FileSide::A);
    let plan_b = HighlightPlan::from_result(&result, FileSide::B);
    let summary = compute_summary(&result, records_a.len(), records_b.len(), &plan_a, &plan_b);

    log::info!(
        "comparison done: {} missing in A, {} missing in B, {} mismatched keys, {} duplicate entries, {} price anomalies",
        result.missing_in_a.len(),
        result.missing_in_b.len(),
        result.mismatched.len(),
        result.duplicated.len(),
        result.price_anomalies.len(),
    );

    Ok(Comparison {
        meta: ComparisonMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            compare_net_price: config.compare_net_price,
        },
        records_a,
        records_b,
        result,
        plan_a,
        plan_b,
        summary,
    })
}
