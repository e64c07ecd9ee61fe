//! In-memory workbook model: values, styles and layout for every sheet.
//!
//! `Workbook` is `Clone`; a clone is a deep, independent snapshot, which is
//! what the annotator writes into.

use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// Styles
// =============================================================================

/// ARGB color, e.g. `0xFFFF9999`.
pub type Argb = u32;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Font {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub size: Option<f64>,
    pub color: Option<Argb>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BorderStyle {
    #[default]
    None,
    Hair,
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BorderSide {
    pub style: BorderStyle,
    pub color: Option<Argb>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Border {
    pub top: BorderSide,
    pub right: BorderSide,
    pub bottom: BorderSide,
    pub left: BorderSide,
}

impl Border {
    pub fn is_none(&self) -> bool {
        [self.top, self.right, self.bottom, self.left]
            .iter()
            .all(|s| s.style == BorderStyle::None)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HorizontalAlign {
    #[default]
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
    CenterAcross,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Center,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alignment {
    pub horizontal: HorizontalAlign,
    pub vertical: VerticalAlign,
    pub wrap_text: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protection {
    pub locked: bool,
    pub hidden: bool,
}

impl Default for Protection {
    fn default() -> Self {
        Self {
            locked: true,
            hidden: false,
        }
    }
}

/// Everything the writer needs to reproduce one cell's look.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStyle {
    pub font: Font,
    /// Solid fill color. Pattern fills other than solid are not kept.
    pub fill: Option<Argb>,
    pub border: Border,
    pub alignment: Alignment,
    /// Excel format code; `None` is General.
    pub number_format: Option<String>,
    pub protection: Protection,
}

impl CellStyle {
    pub fn is_default(&self) -> bool {
        *self == CellStyle::default()
    }
}

// =============================================================================
// Cells
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// True for empty cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

// =============================================================================
// Layout
// =============================================================================

/// Inclusive rectangular merge, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MergedRegion {
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
}

impl MergedRegion {
    pub fn new(first_row: u32, first_col: u16, last_row: u32, last_col: u16) -> Self {
        Self {
            first_row: first_row.min(last_row),
            first_col: first_col.min(last_col),
            last_row: first_row.max(last_row),
            last_col: first_col.max(last_col),
        }
    }

    pub fn contains(&self, row: u32, col: u16) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }

    pub fn is_origin(&self, row: u32, col: u16) -> bool {
        row == self.first_row && col == self.first_col
    }

    /// A 1×1 "merge" covers nothing and xlsx writers reject it.
    pub fn is_single_cell(&self) -> bool {
        self.first_row == self.last_row && self.first_col == self.last_col
    }
}

// =============================================================================
// Sheet
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(u32, u16), Cell>,
    pub merged_regions: Vec<MergedRegion>,
    /// Column widths as stored in the file (character units, padding included).
    pub col_widths: BTreeMap<u16, f64>,
    /// Row heights in points.
    pub row_heights: BTreeMap<u32, f64>,
    pub hidden_rows: BTreeSet<u32>,
    pub hidden_cols: BTreeSet<u16>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn cell(&self, row: u32, col: u16) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn cell_mut(&mut self, row: u32, col: u16) -> &mut Cell {
        self.cells.entry((row, col)).or_default()
    }

    pub fn value(&self, row: u32, col: u16) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cell(row, col).map(|c| &c.value).unwrap_or(&EMPTY)
    }

    pub fn set_value(&mut self, row: u32, col: u16, value: CellValue) {
        self.cell_mut(row, col).value = value;
    }

    pub fn set_style(&mut self, row: u32, col: u16, style: CellStyle) {
        self.cell_mut(row, col).style = style;
    }

    /// All stored cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = ((u32, u16), &Cell)> {
        self.cells.iter().map(|(k, v)| (*k, v))
    }

    /// Stored cells of one row, left to right.
    pub fn row_cells(&self, row: u32) -> impl Iterator<Item = (u16, &Cell)> {
        self.cells
            .range((row, 0)..=(row, u16::MAX))
            .map(|((_, col), cell)| (*col, cell))
    }

    pub fn row_cells_mut(&mut self, row: u32) -> impl Iterator<Item = (u16, &mut Cell)> {
        self.cells
            .range_mut((row, 0)..=(row, u16::MAX))
            .map(|((_, col), cell)| (*col, cell))
    }

    /// Last used row + 1. Styled empty cells count as used.
    pub fn row_count(&self) -> usize {
        self.cells
            .keys()
            .next_back()
            .map(|(row, _)| *row as usize + 1)
            .unwrap_or(0)
    }

    /// Last row holding a non-blank value.
    pub fn last_value_row(&self) -> Option<u32> {
        self.cells
            .iter()
            .rev()
            .find(|(_, cell)| !cell.value.is_blank())
            .map(|((row, _), _)| *row)
    }

    /// Widest populated column + 1.
    pub fn col_count(&self) -> usize {
        self.cells
            .keys()
            .map(|(_, col)| *col as usize + 1)
            .max()
            .unwrap_or(0)
    }

    /// Cells covered by a merge but not its top-left origin.
    pub fn is_merge_hidden(&self, row: u32, col: u16) -> bool {
        self.merged_regions
            .iter()
            .any(|m| m.contains(row, col) && !m.is_origin(row, col))
    }
}

// =============================================================================
// Workbook
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Sheet) -> &mut Sheet {
        self.sheets.push(sheet);
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    /// The sheet every comparison reads from.
    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }

    pub fn first_sheet_mut(&mut self) -> Option<&mut Sheet> {
        self.sheets.first_mut()
    }
}
