//! `invoice-recon`: matches two invoice listings by invoice number.
//!
//! Takes positional rows, returns the missing / mismatched / duplicated /
//! price-anomaly buckets and a highlight plan per file. Spreadsheet reading
//! and writing live in `invoice-recon-io`.

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod model;
pub mod normalize;
pub mod plan;
pub mod reconcile;
pub mod summary;

pub use config::{ColumnMap, CompareConfig, FileConfig};
pub use engine::compare;
pub use error::ReconError;
pub use index::{build_index, InvoiceIndex};
pub use model::{CanonicalRecord, Comparison, ComparisonResult, FileSide, RawCell, RawRow};
pub use normalize::{normalize, SellerExclusions};
pub use plan::{HighlightCategory, HighlightPlan};
pub use reconcile::{reconcile, ReconcileOptions};
pub use summary::ComparisonSummary;
