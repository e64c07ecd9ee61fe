//! Spreadsheet side of invoice-recon: read workbooks and CSV into engine
//! rows, write highlighted copies, bundle them into a zip.

pub mod annotate;
pub mod bundle;
pub mod csv;
pub mod error;
pub mod workbook;
pub mod xlsx;
pub mod xlsx_styles;

pub use annotate::{annotate, export_annotated, AnnotatedFiles, AnnotatedWorkbook};
pub use bundle::{archive_file_name, build_archive, NamedFile};
pub use error::IoError;
pub use workbook::{Cell, CellStyle, CellValue, MergedRegion, Sheet, Workbook};
pub use xlsx::{read_workbook, to_row_array, write_workbook};
