use std::collections::BTreeMap;

use crate::index::InvoiceIndex;
use crate::model::{
    is_numeric_key, CanonicalRecord, ComparisonResult, DuplicateEntry, FileSide, MismatchEntry,
    PriceAnomaly,
};
use crate::normalize::parse_currency;

/// Absolute tolerance when testing `a == 2 * b`.
pub const PRICE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub compare_net_price: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            compare_net_price: true,
        }
    }
}

/// Partition two indexed record sets into the result buckets.
///
/// Pure: the same inputs always give an identical result.
pub fn reconcile(
    index_a: &InvoiceIndex,
    index_b: &InvoiceIndex,
    records_a: &[CanonicalRecord],
    records_b: &[CanonicalRecord],
    options: ReconcileOptions,
) -> ComparisonResult {
    let mut duplicated = find_duplicates(FileSide::A, records_a);
    duplicated.extend(find_duplicates(FileSide::B, records_b));

    let price_anomalies = if options.compare_net_price {
        find_price_anomalies(index_a, index_b)
    } else {
        Vec::new()
    };

    ComparisonResult {
        missing_in_a: find_missing(index_b, index_a),
        missing_in_b: find_missing(index_a, index_b),
        mismatched: find_mismatches(index_a, index_b),
        duplicated,
        price_anomalies,
    }
}

// ---------------------------------------------------------------------------
// Missing
// ---------------------------------------------------------------------------

/// Records of `present` under numeric keys that `absent` lacks.
fn find_missing(present: &InvoiceIndex, absent: &InvoiceIndex) -> Vec<CanonicalRecord> {
    present
        .iter()
        .filter(|(key, _)| is_numeric_key(key) && !absent.contains_key(key))
        .flat_map(|(_, records)| records.iter().cloned())
        .collect()
}

// ---------------------------------------------------------------------------
// Mismatched
// ---------------------------------------------------------------------------

/// One entry per shared key where some cross pair disagrees on tax code.
/// No numeric-key filter here.
fn find_mismatches(index_a: &InvoiceIndex, index_b: &InvoiceIndex) -> Vec<MismatchEntry> {
    let mut out = Vec::new();
    for (key, group_a) in index_a.iter() {
        let Some(group_b) = index_b.get(key) else {
            continue;
        };
        let conflict = group_a.iter().any(|a| {
            group_b.iter().any(|b| {
                !a.tax_code.is_empty() && !b.tax_code.is_empty() && a.tax_code != b.tax_code
            })
        });
        if conflict {
            out.push(MismatchEntry {
                key: key.to_string(),
                records_a: group_a.to_vec(),
                records_b: group_b.to_vec(),
            });
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Duplicated
// ---------------------------------------------------------------------------

/// Same-file groups sharing `(invoice_display, seller)`. Every member of a
/// group counts, and groups with any non-numeric invoice text are ignored.
fn find_duplicates(side: FileSide, records: &[CanonicalRecord]) -> Vec<DuplicateEntry> {
    let mut groups: BTreeMap<(&str, &str), Vec<&CanonicalRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.invoice_display.as_str(), record.seller.as_str()))
            .or_default()
            .push(record);
    }

    let mut dup_groups: Vec<Vec<&CanonicalRecord>> = groups
        .into_values()
        .filter(|g| g.len() > 1 && g.iter().all(|r| r.has_numeric_invoice()))
        .collect();
    // Report in sheet order.
    dup_groups.sort_by_key(|g| g[0].source_row);

    dup_groups
        .into_iter()
        .flatten()
        .map(|record| DuplicateEntry::new(side, record.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Price anomalies
// ---------------------------------------------------------------------------

fn find_price_anomalies(index_a: &InvoiceIndex, index_b: &InvoiceIndex) -> Vec<PriceAnomaly> {
    let mut out = Vec::new();
    for (key, group_a) in index_a.iter() {
        let Some(group_b) = index_b.get(key) else {
            continue;
        };
        for a in group_a {
            for b in group_b {
                if a.invoice_display != b.invoice_display || a.seller != b.seller {
                    continue;
                }
                if let Some(anomaly) = price_anomaly(key, a, b) {
                    out.push(anomaly);
                }
            }
        }
    }
    out
}

fn price_anomaly(key: &str, a: &CanonicalRecord, b: &CanonicalRecord) -> Option<PriceAnomaly> {
    let price_a = parse_currency(&a.net_price)?;
    let price_b = parse_currency(&b.net_price)?;
    if price_a == 0.0 || price_b == 0.0 {
        return None;
    }

    let doubled = if (price_a - 2.0 * price_b).abs() <= PRICE_TOLERANCE {
        FileSide::A
    } else if (price_b - 2.0 * price_a).abs() <= PRICE_TOLERANCE {
        FileSide::B
    } else {
        return None;
    };

    Some(PriceAnomaly {
        key: key.to_string(),
        record_a: a.clone(),
        record_b: b.clone(),
        price_a,
        price_b,
        doubled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;
    use crate::model::RawCell;
    use crate::normalize::{invoice_key, seller_fingerprint};

    fn rec(row: usize, invoice: &str, seller: &str, tax: &str, price: RawCell) -> CanonicalRecord {
        CanonicalRecord {
            source_row: row,
            invoice_key: invoice_key(invoice).unwrap(),
            invoice_display: invoice.to_string(),
            seller: seller_fingerprint(seller),
            seller_display: seller.to_string(),
            tax_code: tax.to_string(),
            net_price: price,
            position: (row + 1).to_string(),
        }
    }

    fn run(a: &[CanonicalRecord], b: &[CanonicalRecord], prices: bool) -> ComparisonResult {
        reconcile(
            &build_index(a),
            &build_index(b),
            a,
            b,
            ReconcileOptions {
                compare_net_price: prices,
            },
        )
    }

    #[test]
    fn same_key_same_tax_code_different_seller_is_clean() {
        let a = vec![rec(1, "017784", "Cong Ty A", "107500414", RawCell::Empty)];
        let b = vec![rec(1, "17784", "Cong Ty B", "107500414", RawCell::Empty)];
        let result = run(&a, &b, true);
        assert_eq!(result, ComparisonResult::default());
    }

    #[test]
    fn missing_on_each_side() {
        let a = vec![
            rec(1, "100", "X", "1", RawCell::Empty),
            rec(2, "101", "X", "1", RawCell::Empty),
            rec(3, "101", "Y", "1", RawCell::Empty),
        ];
        let b = vec![
            rec(1, "100", "X", "1", RawCell::Empty),
            rec(2, "200", "X", "1", RawCell::Empty),
        ];
        let result = run(&a, &b, false);

        let rows_b: Vec<usize> = result.missing_in_b.iter().map(|r| r.source_row).collect();
        assert_eq!(rows_b, vec![2, 3]);
        assert_eq!(result.missing_in_a.len(), 1);
        assert_eq!(result.missing_in_a[0].invoice_key, "200");
    }

    #[test]
    fn non_numeric_keys_are_never_missing() {
        let a = vec![rec(1, "AB12", "X", "1", RawCell::Empty)];
        let result = run(&a, &[], false);
        assert!(result.missing_in_b.is_empty());
    }

    #[test]
    fn mismatch_reports_whole_groups_once() {
        let a = vec![
            rec(1, "500", "X", "111", RawCell::Empty),
            rec(2, "500", "X", "222", RawCell::Empty),
        ];
        let b = vec![rec(4, "0500", "X", "111", RawCell::Empty)];
        let result = run(&a, &b, false);

        assert_eq!(result.mismatched.len(), 1);
        let entry = &result.mismatched[0];
        assert_eq!(entry.key, "500");
        assert_eq!(entry.records_a.len(), 2);
        assert_eq!(entry.records_b.len(), 1);

        let conflicting: Vec<usize> = entry.conflicting_a().iter().map(|r| r.source_row).collect();
        assert_eq!(conflicting, vec![2]);
        assert!(entry.conflicting_b().is_empty());
    }

    #[test]
    fn mismatch_ignores_numeric_shape() {
        let a = vec![rec(1, "HD77", "X", "111", RawCell::Empty)];
        let b = vec![rec(1, "HD77", "X", "999", RawCell::Empty)];
        let result = run(&a, &b, false);
        assert_eq!(result.mismatched.len(), 1);
        assert!(result.missing_in_a.is_empty());
        assert!(result.missing_in_b.is_empty());
    }

    #[test]
    fn duplicates_in_one_file() {
        let a = vec![
            rec(1, "1001", "X", "111111111", RawCell::Empty),
            rec(2, "1001", "X", "111111111", RawCell::Empty),
        ];
        let result = run(&a, &[], false);
        assert_eq!(result.duplicated.len(), 2);
        assert!(result
            .duplicated
            .iter()
            .all(|d| d.from_a.is_some() && d.from_b.is_none() && d.key == "1001"));
    }

    #[test]
    fn three_copies_give_three_entries_for_that_file_only() {
        let a: Vec<_> = (1..=3)
            .map(|i| rec(i, "42", "Seller", "9", RawCell::Empty))
            .collect();
        let b = vec![rec(1, "43", "Seller", "9", RawCell::Empty)];
        let result = run(&a, &b, false);
        let from_a = result.duplicated.iter().filter(|d| d.from_a.is_some()).count();
        let from_b = result.duplicated.iter().filter(|d| d.from_b.is_some()).count();
        assert_eq!((from_a, from_b), (3, 0));
    }

    #[test]
    fn duplicates_need_same_display_and_seller() {
        let a = vec![
            rec(1, "1001", "X", "1", RawCell::Empty),
            rec(2, "01001", "X", "1", RawCell::Empty),
            rec(3, "1002", "Cong Ty X", "1", RawCell::Empty),
            rec(4, "1002", "Cong Ty Y", "1", RawCell::Empty),
            rec(5, "A7", "X", "1", RawCell::Empty),
            rec(6, "A7", "X", "1", RawCell::Empty),
        ];
        let result = run(&a, &[], false);
        assert!(result.duplicated.is_empty());
    }

    #[test]
    fn duplicates_listed_in_sheet_order() {
        let a = vec![
            rec(1, "9", "X", "1", RawCell::Empty),
            rec(2, "1", "X", "1", RawCell::Empty),
            rec(3, "9", "X", "1", RawCell::Empty),
            rec(4, "1", "X", "1", RawCell::Empty),
        ];
        let result = run(&a, &[], false);
        let rows: Vec<usize> = result
            .duplicated
            .iter()
            .filter_map(|d| d.record(FileSide::A))
            .map(|r| r.source_row)
            .collect();
        assert_eq!(rows, vec![1, 3, 2, 4]);
    }

    #[test]
    fn doubled_price_is_flagged() {
        let a = vec![rec(1, "2002", "X", "1", RawCell::Number(1_000_000.0))];
        let b = vec![rec(1, "2002", "X", "1", RawCell::from("2,000,000"))];
        let result = run(&a, &b, true);
        assert_eq!(result.price_anomalies.len(), 1);
        let anomaly = &result.price_anomalies[0];
        assert_eq!(anomaly.key, "2002");
        assert_eq!(anomaly.price_a, 1_000_000.0);
        assert_eq!(anomaly.price_b, 2_000_000.0);
        assert_eq!(anomaly.doubled, FileSide::B);
    }

    #[test]
    fn price_check_respects_option_and_tolerance() {
        let a = vec![rec(1, "2002", "X", "1", RawCell::Number(200.01))];
        let b = vec![rec(1, "2002", "X", "1", RawCell::Number(100.0))];
        assert!(run(&a, &b, false).price_anomalies.is_empty());
        assert_eq!(run(&a, &b, true).price_anomalies[0].doubled, FileSide::A);

        let off = vec![rec(1, "2002", "X", "1", RawCell::Number(200.5))];
        assert!(run(&off, &b, true).price_anomalies.is_empty());
    }

    #[test]
    fn zero_and_unparseable_prices_are_ignored() {
        let zero_a = vec![rec(1, "7", "X", "1", RawCell::Number(0.0))];
        let zero_b = vec![rec(1, "7", "X", "1", RawCell::Number(0.0))];
        assert!(run(&zero_a, &zero_b, true).price_anomalies.is_empty());

        let text_a = vec![rec(1, "7", "X", "1", RawCell::from("n/a"))];
        assert!(run(&text_a, &zero_b, true).price_anomalies.is_empty());
    }

    #[test]
    fn price_pairs_need_matching_display() {
        let a = vec![rec(1, "02002", "X", "1", RawCell::Number(100.0))];
        let b = vec![rec(1, "2002", "X", "1", RawCell::Number(200.0))];
        assert!(run(&a, &b, true).price_anomalies.is_empty());
    }

    #[test]
    fn reconcile_is_repeatable() {
        let a = vec![
            rec(1, "1", "X", "1", RawCell::Number(10.0)),
            rec(2, "1", "X", "2", RawCell::Number(10.0)),
            rec(3, "3", "X", "1", RawCell::Empty),
        ];
        let b = vec![
            rec(1, "1", "X", "1", RawCell::Number(20.0)),
            rec(2, "4", "X", "1", RawCell::Empty),
        ];
        assert_eq!(run(&a, &b, true), run(&a, &b, true));
    }
}
