use serde::Deserialize;

use crate::error::ReconError;
use crate::model::{FileSide, RawRow};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CompareConfig {
    /// Flag cross-file pairs where one net price is double the other.
    #[serde(default = "default_compare_net_price")]
    pub compare_net_price: bool,
    /// Seller names whose rows are dropped before indexing.
    #[serde(default)]
    pub excluded_sellers: Vec<String>,
    #[serde(default)]
    pub file_a: FileConfig,
    #[serde(default)]
    pub file_b: FileConfig,
}

fn default_compare_net_price() -> bool {
    true
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            compare_net_price: true,
            excluded_sellers: Vec::new(),
            file_a: FileConfig::default(),
            file_b: FileConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-file column settings
// ---------------------------------------------------------------------------

/// Column settings as entered by the user: 0-based, signed so that
/// negative input is reported as an invalid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_invoice_col")]
    pub invoice_col: i64,
    #[serde(default = "default_seller_col")]
    pub seller_col: i64,
    #[serde(default = "default_tax_code_col")]
    pub tax_code_col: i64,
    #[serde(default = "default_net_price_col")]
    pub net_price_col: i64,
    #[serde(default)]
    pub start_row: i64,
}

fn default_invoice_col() -> i64 {
    0
}

fn default_seller_col() -> i64 {
    1
}

fn default_tax_code_col() -> i64 {
    2
}

fn default_net_price_col() -> i64 {
    3
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            invoice_col: default_invoice_col(),
            seller_col: default_seller_col(),
            tax_code_col: default_tax_code_col(),
            net_price_col: default_net_price_col(),
            start_row: 0,
        }
    }
}

/// Validated, data-checked column indices for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub invoice_col: usize,
    pub seller_col: usize,
    pub tax_code_col: usize,
    pub net_price_col: usize,
    pub start_row: usize,
}

impl FileConfig {
    fn named_columns(&self) -> [(&'static str, i64); 4] {
        [
            ("invoice", self.invoice_col),
            ("seller", self.seller_col),
            ("tax code", self.tax_code_col),
            ("net price", self.net_price_col),
        ]
    }

    /// Checks that need no sheet data: every index must be non-negative.
    pub fn check_signs(&self, side: FileSide) -> Result<(), ReconError> {
        for (name, col) in self.named_columns() {
            if col < 0 {
                return Err(ReconError::invalid(
                    side,
                    format!("{name} column must not be negative, got {col}"),
                ));
            }
        }
        if self.start_row < 0 {
            return Err(ReconError::invalid(
                side,
                format!("start row must not be negative, got {}", self.start_row),
            ));
        }
        Ok(())
    }

    /// Check the settings against the loaded rows and produce typed indices.
    ///
    /// The net price column is only checked when price comparison is on,
    /// since it is never read otherwise.
    pub fn resolve(
        &self,
        side: FileSide,
        rows: &[RawRow],
        check_net_price: bool,
    ) -> Result<ColumnMap, ReconError> {
        self.check_signs(side)?;

        let start_row = self.start_row as usize;
        if start_row >= rows.len() {
            return Err(ReconError::invalid(
                side,
                format!(
                    "start row {start_row} is beyond the sheet ({} rows)",
                    rows.len()
                ),
            ));
        }

        let widest = rows[start_row..].iter().map(|r| r.len()).max().unwrap_or(0);
        for (name, col) in self.named_columns() {
            if name == "net price" && !check_net_price {
                continue;
            }
            if col as usize >= widest {
                return Err(ReconError::invalid(
                    side,
                    format!("{name} column {col} is beyond the data ({widest} columns)"),
                ));
            }
        }

        Ok(ColumnMap {
            invoice_col: self.invoice_col as usize,
            seller_col: self.seller_col as usize,
            tax_code_col: self.tax_code_col as usize,
            net_price_col: self.net_price_col as usize,
            start_row,
        })
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl CompareConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: CompareConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        self.file_a.check_signs(FileSide::A)?;
        self.file_b.check_signs(FileSide::B)?;
        Ok(())
    }

    pub fn file(&self, side: FileSide) -> &FileConfig {
        match side {
            FileSide::A => &self.file_a,
            FileSide::B => &self.file_b,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
