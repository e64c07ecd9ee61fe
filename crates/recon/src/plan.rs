use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::{ComparisonResult, FileSide};

/// Why a row is highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightCategory {
    Missing,
    Mismatched,
    Duplicated,
    PriceAnomaly,
}

impl HighlightCategory {
    /// Legend order.
    pub const ALL: [HighlightCategory; 4] = [
        Self::Missing,
        Self::Mismatched,
        Self::Duplicated,
        Self::PriceAnomaly,
    ];

    /// Fill color as ARGB.
    pub fn argb(self) -> u32 {
        match self {
            Self::Missing => 0xFFFF_9999,
            Self::Mismatched => 0xFFE9_C46A,
            Self::Duplicated => 0xFFA8_D1FF,
            Self::PriceAnomaly => 0xFFC3_E6CB,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Missing => "Missing in the other file",
            Self::Mismatched => "Tax code differs from the other file",
            Self::Duplicated => "Duplicated within this file",
            Self::PriceAnomaly => "Net price is double or half of the other file",
        }
    }

    /// Higher wins when a row falls into several categories.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Duplicated => 3,
            Self::Mismatched => 2,
            Self::PriceAnomaly => 1,
            Self::Missing => 0,
        }
    }
}

/// Rows to color in one file, as 0-based sheet row indices per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HighlightPlan {
    pub missing: BTreeSet<usize>,
    pub mismatched: BTreeSet<usize>,
    pub duplicated: BTreeSet<usize>,
    pub price_anomaly: BTreeSet<usize>,
}

impl HighlightPlan {
    /// Rows of `side`'s sheet touched by each bucket.
    ///
    /// Mismatch rows are narrowed to records whose tax code has no
    /// counterpart under the same key in the other file.
    pub fn from_result(result: &ComparisonResult, side: FileSide) -> Self {
        let mut plan = Self::default();

        plan.missing
            .extend(result.only_in(side).iter().map(|r| r.source_row));

        for entry in &result.mismatched {
            let rows = match side {
                FileSide::A => entry.conflicting_a(),
                FileSide::B => entry.conflicting_b(),
            };
            plan.mismatched.extend(rows.iter().map(|r| r.source_row));
        }

        plan.duplicated.extend(
            result
                .duplicated
                .iter()
                .filter_map(|d| d.record(side))
                .map(|r| r.source_row),
        );

        plan.price_anomaly
            .extend(result.price_anomalies.iter().map(|p| match side {
                FileSide::A => p.record_a.source_row,
                FileSide::B => p.record_b.source_row,
            }));

        plan
    }

    pub fn rows(&self, category: HighlightCategory) -> &BTreeSet<usize> {
        match category {
            HighlightCategory::Missing => &self.missing,
            HighlightCategory::Mismatched => &self.mismatched,
            HighlightCategory::Duplicated => &self.duplicated,
            HighlightCategory::PriceAnomaly => &self.price_anomaly,
        }
    }

    pub fn rows_mut(&mut self, category: HighlightCategory) -> &mut BTreeSet<usize> {
        match category {
            HighlightCategory::Missing => &mut self.missing,
            HighlightCategory::Mismatched => &mut self.mismatched,
            HighlightCategory::Duplicated => &mut self.duplicated,
            HighlightCategory::PriceAnomaly => &mut self.price_anomaly,
        }
    }

    pub fn count(&self, category: HighlightCategory) -> usize {
        self.rows(category).len()
    }

    pub fn is_empty(&self) -> bool {
        HighlightCategory::ALL
            .iter()
            .all(|c| self.rows(*c).is_empty())
    }

    /// One category per row, highest precedence wins.
    pub fn resolved(&self) -> BTreeMap<usize, HighlightCategory> {
        let mut out: BTreeMap<usize, HighlightCategory> = BTreeMap::new();
        for category in HighlightCategory::ALL {
            for &row in self.rows(category) {
                out.entry(row)
                    .and_modify(|current| {
                        if category.precedence() > current.precedence() {
                            *current = category;
                        }
                    })
                    .or_insert(category);
            }
        }
        out
    }
}
