use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::ColumnMap;
use crate::model::{CanonicalRecord, RawCell, RawRow};

/// Longer keys are accounting codes or notes, not invoice numbers.
pub const MAX_INVOICE_KEY_LEN: usize = 8;

static EMPTY: RawCell = RawCell::Empty;

// ---------------------------------------------------------------------------
// Seller exclusions
// ---------------------------------------------------------------------------

/// Seller names whose rows are dropped before indexing.
#[derive(Debug, Clone, Default)]
pub struct SellerExclusions {
    folded: Vec<String>,
}

impl SellerExclusions {
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        let folded = entries
            .iter()
            .map(|e| fold_name(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { folded }
    }

    /// A seller is excluded when its folded full name contains any folded entry.
    pub fn matches(&self, seller: &str) -> bool {
        if self.folded.is_empty() {
            return false;
        }
        let name = fold_name(seller);
        self.folded.iter().any(|entry| name.contains(entry.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.folded.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Field normalization
// ---------------------------------------------------------------------------

/// Derive the join key from an invoice number as displayed.
///
/// Returns `None` when nothing usable remains or the key is longer than
/// [`MAX_INVOICE_KEY_LEN`].
pub fn invoice_key(display: &str) -> Option<String> {
    let text = display.trim();
    // Leading apostrophe is Excel's literal-text prefix, not part of the number.
    let text = text.strip_prefix('\'').unwrap_or(text);
    let head = match text.find(|c: char| c == '"' || c == '\'') {
        Some(pos) => &text[..pos],
        None => text,
    };
    let head = head.trim();
    if head.is_empty() {
        return None;
    }

    let stripped = head.trim_start_matches('0');
    let key = if stripped.is_empty() { "0" } else { stripped };
    if key.chars().count() > MAX_INVOICE_KEY_LEN {
        return None;
    }
    Some(key.to_string())
}

/// Last three words, lowercased, diacritics removed.
pub fn seller_fingerprint(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let tail = if words.len() <= 3 {
        &words[..]
    } else {
        &words[words.len() - 3..]
    };
    strip_diacritics(&tail.join(" ").to_lowercase())
}

/// Whole name, whitespace collapsed, lowercased, diacritics removed.
pub fn fold_name(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_diacritics(&collapsed.to_lowercase())
}

/// NFD-decompose and drop combining marks; đ/Đ have no decomposition and
/// are mapped explicitly.
pub fn strip_diacritics(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' => 'd',
            'Đ' => 'D',
            other => other,
        })
        .collect()
}

/// Cut at the first dash (branch suffix), keep digits, drop leading zeros.
pub fn normalize_tax_code(raw: &str) -> String {
    let head = raw.split('-').next().unwrap_or("");
    let digits: String = head.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.trim_start_matches('0').to_string()
}

/// Parse a net price cell as a currency amount.
///
/// Text keeps only digits, `.` and `-` before parsing, so thousands
/// separators written with commas or spaces are tolerated.
pub fn parse_currency(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Number(n) if n.is_finite() => Some(*n),
        RawCell::Text(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Row normalization
// ---------------------------------------------------------------------------

/// Turn one raw row into a canonical record, or `None` when the row is skipped.
///
/// Skipped rows: empty invoice cell, excluded seller, invoice key longer than
/// [`MAX_INVOICE_KEY_LEN`], empty tax code after normalization.
pub fn normalize(
    row: &RawRow,
    row_index: usize,
    columns: &ColumnMap,
    exclusions: &SellerExclusions,
) -> Option<CanonicalRecord> {
    let cell = |col: usize| row.get(col).unwrap_or(&EMPTY);

    let invoice_cell = cell(columns.invoice_col);
    if invoice_cell.is_blank() {
        return None;
    }
    let invoice_display = invoice_cell.display().trim().to_string();

    let seller_display = cell(columns.seller_col).display().trim().to_string();
    if exclusions.matches(&seller_display) {
        log::trace!("row {row_index}: seller '{seller_display}' excluded");
        return None;
    }

    let invoice_key = invoice_key(&invoice_display)?;

    let tax_code = normalize_tax_code(&cell(columns.tax_code_col).display());
    if tax_code.is_empty() {
        log::trace!("row {row_index}: empty tax code");
        return None;
    }

    let position = match row.first() {
        Some(first) if !first.is_blank() && *first != RawCell::Number(0.0) => {
            first.display().trim().to_string()
        }
        _ => (row_index + 1).to_string(),
    };

    Some(CanonicalRecord {
        source_row: row_index,
        invoice_key,
        invoice_display,
        seller: seller_fingerprint(&seller_display),
        seller_display,
        tax_code,
        net_price: cell(columns.net_price_col).clone(),
        position,
    })
}

/// Normalize every data row from `columns.start_row` on.
pub fn normalize_rows(
    rows: &[RawRow],
    columns: &ColumnMap,
    exclusions: &SellerExclusions,
) -> Vec<CanonicalRecord> {
    rows.iter()
        .enumerate()
        .skip(columns.start_row)
        .filter_map(|(i, row)| normalize(row, i, columns, exclusions))
        .collect()
}
