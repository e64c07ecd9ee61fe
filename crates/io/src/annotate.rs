//! Highlighted copies of the compared workbooks.
//!
//! The caller's workbook is never touched: every annotation starts from a
//! `clone()` and only the first sheet (the one the rows came from) is
//! colored. Only cells that hold a value get a fill; font, border and
//! alignment are left as they were.

use invoice_recon::model::FileSide;
use invoice_recon::plan::{HighlightCategory, HighlightPlan};

use crate::error::IoError;
use crate::workbook::{CellStyle, CellValue, Sheet, Workbook};
use crate::xlsx::write_workbook;

pub const LEGEND_TITLE: &str = "Legend:";

/// An annotated copy plus the highlight requests that could not be applied.
#[derive(Debug, Clone)]
pub struct AnnotatedWorkbook {
    pub workbook: Workbook,
    pub warnings: Vec<String>,
}

/// Serialized output of [`export_annotated`].
#[derive(Debug, Clone)]
pub struct AnnotatedFiles {
    pub file_a: Vec<u8>,
    pub file_b: Vec<u8>,
    /// Skipped out-of-range rows, file A first.
    pub warnings: Vec<String>,
}

impl AnnotatedFiles {
    pub fn bytes(&self, side: FileSide) -> &[u8] {
        match side {
            FileSide::A => &self.file_a,
            FileSide::B => &self.file_b,
        }
    }
}

/// Annotate both workbooks and serialize them.
///
/// Out-of-range rows are skipped with a warning; a serialization failure
/// of either file fails the whole export.
pub fn export_annotated(
    original_a: &Workbook,
    original_b: &Workbook,
    plan_a: &HighlightPlan,
    plan_b: &HighlightPlan,
) -> Result<AnnotatedFiles, IoError> {
    let annotated_a = annotate(original_a, plan_a, FileSide::A);
    let annotated_b = annotate(original_b, plan_b, FileSide::B);

    let file_a = write_workbook(&annotated_a.workbook)?;
    let file_b = write_workbook(&annotated_b.workbook)?;

    let mut warnings = annotated_a.warnings;
    warnings.extend(annotated_b.warnings);

    log::info!(
        "exported annotated files: {} + {} bytes, {} skipped rows",
        file_a.len(),
        file_b.len(),
        warnings.len()
    );

    Ok(AnnotatedFiles {
        file_a,
        file_b,
        warnings,
    })
}

/// Color the planned rows of a deep copy and append the legend.
pub fn annotate(original: &Workbook, plan: &HighlightPlan, side: FileSide) -> AnnotatedWorkbook {
    let mut workbook = original.clone();
    let mut warnings = Vec::new();

    let Some(sheet) = workbook.first_sheet_mut() else {
        let msg = format!("{side}: workbook has no sheets, nothing highlighted");
        log::warn!("{msg}");
        warnings.push(msg);
        return AnnotatedWorkbook { workbook, warnings };
    };

    let legend_row = legend_start(sheet, sheet.last_value_row().map(|r| r + 2).unwrap_or(0));
    let row_count = sheet.row_count();

    for (row, category) in plan.resolved() {
        let in_range = row < row_count;
        let Some(row) = u32::try_from(row).ok().filter(|_| in_range) else {
            let msg = format!(
                "{side}: highlight row {row} is outside the sheet ({row_count} rows), skipped"
            );
            log::warn!("{msg}");
            warnings.push(msg);
            continue;
        };
        let filled = fill_row(sheet, row, category);
        log::debug!("{side}: row {row} {category:?}, {filled} cells filled");
    }

    write_legend(sheet, legend_row);

    AnnotatedWorkbook { workbook, warnings }
}

/// Fill the populated cells of one row. Returns how many were colored.
fn fill_row(sheet: &mut Sheet, row: u32, category: HighlightCategory) -> usize {
    let mut filled = 0;
    for (_, cell) in sheet.row_cells_mut(row) {
        if cell.value.is_blank() {
            continue;
        }
        cell.style.fill = Some(category.argb());
        filled += 1;
    }
    filled
}

/// First row at or after `from` where every legend row is free in column 0:
/// no existing cell, styled or not, and no merged region.
fn legend_start(sheet: &Sheet, from: u32) -> u32 {
    let height = HighlightCategory::ALL.len() as u32 + 1;
    let is_free = |row: u32| {
        sheet.cell(row, 0).is_none() && !sheet.merged_regions.iter().any(|m| m.contains(row, 0))
    };
    let mut first = from;
    while let Some(taken) = (first..first.saturating_add(height))
        .rev()
        .find(|&row| !is_free(row))
    {
        first = taken.saturating_add(1);
    }
    if first != from {
        log::debug!("legend moved from row {from} to {first} past existing cells");
    }
    first
}

fn write_legend(sheet: &mut Sheet, first_row: u32) {
    let mut title = CellStyle::default();
    title.font.bold = true;
    let cell = sheet.cell_mut(first_row, 0);
    cell.value = CellValue::Text(LEGEND_TITLE.to_string());
    cell.style = title;

    for (offset, category) in (1u32..).zip(HighlightCategory::ALL) {
        let cell = sheet.cell_mut(first_row + offset, 0);
        cell.value = CellValue::Text(category.label().to_string());
        cell.style = CellStyle {
            fill: Some(category.argb()),
            ..CellStyle::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::{Border, BorderSide, BorderStyle, MergedRegion};

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    /// Ten rows of three columns, with a whitespace cell in row 2 and a
    /// bordered empty cell at the end of row 3.
    fn ten_rows() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.add_sheet(Sheet::new("Invoices"));
        for row in 0..10u32 {
            sheet.set_value(row, 0, text(&format!("{}", 1000 + row)));
            sheet.set_value(row, 1, text("Cong Ty A"));
            sheet.set_value(row, 2, CellValue::Number(100.0));
        }
        sheet.set_value(2, 1, text("   "));
        sheet.cell_mut(3, 4).style.border = Border {
            bottom: BorderSide {
                style: BorderStyle::Thin,
                color: None,
            },
            ..Border::default()
        };
        wb
    }

    fn fill(wb: &Workbook, row: u32, col: u16) -> Option<u32> {
        wb.first_sheet()
            .and_then(|s| s.cell(row, col))
            .and_then(|c| c.style.fill)
    }

    #[test]
    fn only_populated_cells_are_filled() {
        let wb = ten_rows();
        let mut plan = HighlightPlan::default();
        plan.missing.insert(2);
        plan.duplicated.insert(3);

        let out = annotate(&wb, &plan, FileSide::A);
        assert!(out.warnings.is_empty());

        let missing = HighlightCategory::Missing.argb();
        assert_eq!(fill(&out.workbook, 2, 0), Some(missing));
        assert_eq!(fill(&out.workbook, 2, 1), None);
        assert_eq!(fill(&out.workbook, 2, 2), Some(missing));

        let dup = HighlightCategory::Duplicated.argb();
        assert_eq!(fill(&out.workbook, 3, 0), Some(dup));
        // Styled but empty: border kept, no fill.
        let bordered = out.workbook.first_sheet().unwrap().cell(3, 4).unwrap();
        assert_eq!(bordered.style.fill, None);
        assert_eq!(bordered.style.border.bottom.style, BorderStyle::Thin);
    }

    #[test]
    fn original_is_left_untouched() {
        let wb = ten_rows();
        let before = wb.clone();
        let mut plan = HighlightPlan::default();
        plan.mismatched.extend([0, 1, 2]);
        let _ = annotate(&wb, &plan, FileSide::B);
        assert_eq!(wb, before);
    }

    #[test]
    fn out_of_range_row_is_skipped() {
        let wb = ten_rows();
        let mut plan = HighlightPlan::default();
        plan.missing.insert(500);
        plan.missing.insert(4);

        let out = annotate(&wb, &plan, FileSide::A);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("row 500"));
        assert!(out.warnings[0].starts_with("file A"));
        assert_eq!(fill(&out.workbook, 4, 0), Some(HighlightCategory::Missing.argb()));
        assert!(out.workbook.first_sheet().unwrap().cell(500, 0).is_none());
    }

    #[test]
    fn precedence_picks_one_color() {
        let wb = ten_rows();
        let mut plan = HighlightPlan::default();
        for category in HighlightCategory::ALL {
            plan.rows_mut(category).insert(5);
        }
        plan.missing.insert(6);
        plan.price_anomaly.insert(6);

        let out = annotate(&wb, &plan, FileSide::A);
        assert_eq!(fill(&out.workbook, 5, 0), Some(HighlightCategory::Duplicated.argb()));
        assert_eq!(fill(&out.workbook, 6, 0), Some(HighlightCategory::PriceAnomaly.argb()));
    }

    #[test]
    fn legend_below_last_value_row() {
        let wb = ten_rows();
        let out = annotate(&wb, &HighlightPlan::default(), FileSide::A);
        let sheet = out.workbook.first_sheet().unwrap();

        // Last value row is 9; one blank row, then the legend.
        assert!(sheet.row_cells(10).next().is_none());
        let title = sheet.cell(11, 0).unwrap();
        assert_eq!(title.value, text(LEGEND_TITLE));
        assert!(title.style.font.bold);

        for (i, category) in HighlightCategory::ALL.into_iter().enumerate() {
            let cell = sheet.cell(12 + i as u32, 0).unwrap();
            assert_eq!(cell.value, text(category.label()));
            assert_eq!(cell.style.fill, Some(category.argb()));
        }
    }

    #[test]
    fn legend_skips_styled_and_merged_rows_below_the_data() {
        let mut wb = ten_rows();
        let sheet = wb.first_sheet_mut().unwrap();
        // Signature block under the table: a bordered blank, then a merged box.
        sheet.cell_mut(11, 0).style.border.top = BorderSide {
            style: BorderStyle::Medium,
            color: None,
        };
        sheet.merged_regions.push(MergedRegion::new(12, 0, 13, 2));

        let out = annotate(&wb, &HighlightPlan::default(), FileSide::A);
        let sheet = out.workbook.first_sheet().unwrap();

        let bordered = sheet.cell(11, 0).unwrap();
        assert_eq!(bordered.value, CellValue::Empty);
        assert_eq!(bordered.style.border.top.style, BorderStyle::Medium);
        assert_eq!(bordered.style.fill, None);
        assert!(sheet.cell(12, 0).is_none());
        assert!(sheet.cell(13, 0).is_none());

        assert_eq!(sheet.value(14, 0), &text(LEGEND_TITLE));
        for (i, category) in HighlightCategory::ALL.into_iter().enumerate() {
            let row = 15 + i as u32;
            assert_eq!(sheet.value(row, 0), &text(category.label()));
            assert!(!sheet.is_merge_hidden(row, 0));
        }
    }

    #[test]
    fn legend_on_empty_sheet_starts_at_top() {
        let mut wb = Workbook::new();
        wb.add_sheet(Sheet::new("Empty"));
        let out = annotate(&wb, &HighlightPlan::default(), FileSide::B);
        let sheet = out.workbook.first_sheet().unwrap();
        assert_eq!(sheet.value(0, 0), &text(LEGEND_TITLE));
    }

    #[test]
    fn workbook_without_sheets_warns() {
        let out = annotate(&Workbook::new(), &HighlightPlan::default(), FileSide::B);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.workbook.sheets.is_empty());
    }

    #[test]
    fn export_returns_both_files() {
        let wb = ten_rows();
        let mut plan_a = HighlightPlan::default();
        plan_a.missing.insert(1);
        let mut plan_b = HighlightPlan::default();
        plan_b.missing.insert(500);

        let files = export_annotated(&wb, &wb, &plan_a, &plan_b).unwrap();
        assert!(files.bytes(FileSide::A).starts_with(b"PK"));
        assert!(files.bytes(FileSide::B).starts_with(b"PK"));
        assert_eq!(files.warnings.len(), 1);
        assert!(files.warnings[0].starts_with("file B"));
    }
}
