use serde::Serialize;

use crate::plan::HighlightPlan;
use crate::summary::ComparisonSummary;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One cell as handed over by the spreadsheet reader.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

/// One worksheet row, column 0 first. Trailing empties may be omitted.
pub type RawRow = Vec<RawCell>;

impl RawCell {
    /// True for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }

    /// Text rendering used for invoice numbers, sellers and tax codes.
    /// Integral numbers print without a fractional part.
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Self::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

impl From<&str> for RawCell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<f64> for RawCell {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// Which of the two compared files a record or plan belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSide {
    A,
    B,
}

impl FileSide {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl std::fmt::Display for FileSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "file A"),
            Self::B => write!(f, "file B"),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

/// One data row after extraction and normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    /// 0-based row position in the raw sheet.
    pub source_row: usize,
    /// Join key: quote-truncated, leading zeros stripped, at most 8 chars.
    pub invoice_key: String,
    /// Invoice number as it appears in the sheet.
    pub invoice_display: String,
    /// Seller fingerprint (last three words, lowercase, no diacritics).
    pub seller: String,
    /// Seller name as it appears in the sheet, trimmed.
    pub seller_display: String,
    /// Digits only, no leading zeros, never empty.
    pub tax_code: String,
    pub net_price: RawCell,
    /// First-column value, or the 1-based row number when that cell is empty.
    pub position: String,
}

impl CanonicalRecord {
    pub fn has_numeric_invoice(&self) -> bool {
        is_numeric_key(&self.invoice_display)
    }
}

/// `^\d+$`
pub fn is_numeric_key(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Reconciliation buckets
// ---------------------------------------------------------------------------

/// Same invoice key on both sides with at least one conflicting tax code pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MismatchEntry {
    pub key: String,
    pub records_a: Vec<CanonicalRecord>,
    pub records_b: Vec<CanonicalRecord>,
}

impl MismatchEntry {
    /// Records of file A whose tax code appears nowhere under this key in file B.
    pub fn conflicting_a(&self) -> Vec<&CanonicalRecord> {
        conflicting(&self.records_a, &self.records_b)
    }

    /// Records of file B whose tax code appears nowhere under this key in file A.
    pub fn conflicting_b(&self) -> Vec<&CanonicalRecord> {
        conflicting(&self.records_b, &self.records_a)
    }
}

fn conflicting<'a>(
    own: &'a [CanonicalRecord],
    other: &[CanonicalRecord],
) -> Vec<&'a CanonicalRecord> {
    own.iter()
        .filter(|r| !other.iter().any(|o| o.tax_code == r.tax_code))
        .collect()
}

/// One member of a same-file duplicate group. Exactly one side is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateEntry {
    pub key: String,
    pub from_a: Option<CanonicalRecord>,
    pub from_b: Option<CanonicalRecord>,
}

impl DuplicateEntry {
    pub fn new(side: FileSide, record: CanonicalRecord) -> Self {
        let key = record.invoice_key.clone();
        match side {
            FileSide::A => Self {
                key,
                from_a: Some(record),
                from_b: None,
            },
            FileSide::B => Self {
                key,
                from_a: None,
                from_b: Some(record),
            },
        }
    }

    pub fn record(&self, side: FileSide) -> Option<&CanonicalRecord> {
        match side {
            FileSide::A => self.from_a.as_ref(),
            FileSide::B => self.from_b.as_ref(),
        }
    }
}

/// Cross-file pair where one net price is double the other.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceAnomaly {
    pub key: String,
    pub record_a: CanonicalRecord,
    pub record_b: CanonicalRecord,
    pub price_a: f64,
    pub price_b: f64,
    /// Side holding the doubled amount.
    pub doubled: FileSide,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonResult {
    /// Records of file B whose key is absent from file A.
    pub missing_in_a: Vec<CanonicalRecord>,
    /// Records of file A whose key is absent from file B.
    pub missing_in_b: Vec<CanonicalRecord>,
    pub mismatched: Vec<MismatchEntry>,
    pub duplicated: Vec<DuplicateEntry>,
    pub price_anomalies: Vec<PriceAnomaly>,
}

impl ComparisonResult {
    /// Records only present in the other file, as seen from `side`'s sheet.
    pub fn only_in(&self, side: FileSide) -> &[CanonicalRecord] {
        match side {
            FileSide::A => &self.missing_in_b,
            FileSide::B => &self.missing_in_a,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonMeta {
    pub engine_version: String,
    pub run_at: String,
    pub compare_net_price: bool,
}

/// Everything one comparison run produces.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub meta: ComparisonMeta,
    pub records_a: Vec<CanonicalRecord>,
    pub records_b: Vec<CanonicalRecord>,
    pub result: ComparisonResult,
    pub plan_a: HighlightPlan,
    pub plan_b: HighlightPlan,
    pub summary: ComparisonSummary,
}

impl Comparison {
    pub fn plan(&self, side: FileSide) -> &HighlightPlan {
        match side {
            FileSide::A => &self.plan_a,
            FileSide::B => &self.plan_b,
        }
    }
}
