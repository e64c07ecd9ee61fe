use std::io::{Cursor, Read};
use std::path::PathBuf;

use chrono::NaiveDate;
use invoice_recon::{compare, CompareConfig, FileSide, HighlightCategory};
use invoice_recon_io::annotate::LEGEND_TITLE;
use invoice_recon_io::bundle::{README_NAME, SUMMARY_NAME};
use invoice_recon_io::workbook::BorderStyle;
use invoice_recon_io::{
    build_archive, export_annotated, read_workbook, to_row_array, CellValue, MergedRegion,
    NamedFile, Workbook,
};
use rust_xlsxwriter::{Format, FormatBorder, Workbook as XlsxWorkbook};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../recon/tests/fixtures")
}

fn tsv_lines(name: &str) -> Vec<Vec<String>> {
    let path = fixtures_dir().join(name);
    let data = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    data.lines()
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

/// Write the fixture as an xlsx sheet. Every field is a text cell, the way
/// invoice numbers with leading zeros come out of accounting exports.
/// `title_row` gets merged across the table width.
fn fixture_xlsx(name: &str, title_row: Option<usize>) -> Vec<u8> {
    let lines = tsv_lines(name);
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(1) as u16;

    let mut wb = XlsxWorkbook::new();
    let ws = wb.add_worksheet().set_name("Sheet1").unwrap();
    let header = Format::new().set_bold().set_border_bottom(FormatBorder::Thin);
    let bordered = Format::new().set_border(FormatBorder::Thin);

    for (row, fields) in lines.iter().enumerate() {
        let row = row as u32;
        if Some(row as usize) == title_row {
            ws.merge_range(row, 0, row, width - 1, &fields[0], &header).unwrap();
            continue;
        }
        for (col, field) in fields.iter().enumerate() {
            if !field.is_empty() {
                ws.write_string(row, col as u16, field).unwrap();
            }
        }
        // Bordered but empty cell past the data on every row.
        ws.write_blank(row, width + 1, &bordered).unwrap();
    }
    ws.set_column_width(2, 30.0).unwrap();

    wb.save_to_buffer().unwrap()
}

fn config() -> CompareConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("compare.toml")).unwrap();
    CompareConfig::from_toml(&toml).unwrap()
}

fn fill(wb: &Workbook, row: u32, col: u16) -> Option<u32> {
    wb.first_sheet()
        .and_then(|s| s.cell(row, col))
        .and_then(|c| c.style.fill)
}

struct Run {
    original_a: Workbook,
    original_b: Workbook,
    annotated_a: Workbook,
    annotated_b: Workbook,
    bytes_a: Vec<u8>,
    bytes_b: Vec<u8>,
    warnings: Vec<String>,
    summary: invoice_recon::ComparisonSummary,
}

fn run() -> Run {
    let original_a = read_workbook(&fixture_xlsx("file_a.tsv", None)).unwrap();
    let original_b = read_workbook(&fixture_xlsx("file_b.tsv", Some(0))).unwrap();

    let cmp = compare(
        &config(),
        &to_row_array(&original_a),
        &to_row_array(&original_b),
    )
    .unwrap();

    let files = export_annotated(&original_a, &original_b, &cmp.plan_a, &cmp.plan_b).unwrap();
    Run {
        annotated_a: read_workbook(files.bytes(FileSide::A)).unwrap(),
        annotated_b: read_workbook(files.bytes(FileSide::B)).unwrap(),
        bytes_a: files.file_a,
        bytes_b: files.file_b,
        warnings: files.warnings,
        original_a,
        original_b,
        summary: cmp.summary,
    }
}

#[test]
fn workbook_rows_reconcile_like_the_tsv_fixture() {
    let original_a = read_workbook(&fixture_xlsx("file_a.tsv", None)).unwrap();
    let original_b = read_workbook(&fixture_xlsx("file_b.tsv", Some(0))).unwrap();
    let cmp = compare(
        &config(),
        &to_row_array(&original_a),
        &to_row_array(&original_b),
    )
    .unwrap();

    assert_eq!(cmp.records_a.len(), 6);
    assert_eq!(cmp.records_b.len(), 5);
    assert_eq!(cmp.result.missing_in_b.len(), 1);
    assert_eq!(cmp.result.missing_in_b[0].invoice_key, "4004");
    assert_eq!(cmp.result.price_anomalies.len(), 1);
    assert_eq!(cmp.plan_a.duplicated.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
}

#[test]
fn annotated_rows_carry_their_category_color() {
    let run = run();
    assert!(run.warnings.is_empty(), "{:?}", run.warnings);

    let a = &run.annotated_a;
    assert_eq!(fill(a, 7, 1), Some(HighlightCategory::Missing.argb()));
    assert_eq!(fill(a, 8, 1), Some(HighlightCategory::Mismatched.argb()));
    assert_eq!(fill(a, 2, 0), Some(HighlightCategory::Duplicated.argb()));
    assert_eq!(fill(a, 3, 4), Some(HighlightCategory::Duplicated.argb()));
    assert_eq!(fill(a, 4, 1), Some(HighlightCategory::PriceAnomaly.argb()));
    assert_eq!(fill(a, 1, 1), None);

    let b = &run.annotated_b;
    assert_eq!(fill(b, 6, 0), Some(HighlightCategory::Missing.argb()));
    assert_eq!(fill(b, 5, 2), Some(HighlightCategory::Mismatched.argb()));
    assert_eq!(fill(b, 4, 3), Some(HighlightCategory::PriceAnomaly.argb()));
}

#[test]
fn blank_cells_are_never_filled() {
    let run = run();
    for wb in [&run.annotated_a, &run.annotated_b] {
        let sheet = wb.first_sheet().unwrap();
        for ((row, col), cell) in sheet.cells() {
            if cell.value.is_blank() {
                assert_eq!(cell.style.fill, None, "blank cell ({row}, {col}) was filled");
            }
        }
    }
    // The bordered blank next to a highlighted row keeps its border.
    let cell = run.annotated_a.first_sheet().unwrap().cell(7, 6).unwrap();
    assert_eq!(cell.style.border.left.style, BorderStyle::Thin);
}

#[test]
fn formatting_and_originals_survive() {
    let run = run();

    let b = run.annotated_b.first_sheet().unwrap();
    assert_eq!(b.merged_regions, vec![MergedRegion::new(0, 0, 0, 3)]);
    assert!(b.cell(0, 0).unwrap().style.font.bold);
    let width = b.col_widths.get(&2).copied().unwrap();
    assert!((30.0..31.0).contains(&width), "{width}");

    // The caller's workbooks hold no fills at all.
    for wb in [&run.original_a, &run.original_b] {
        assert!(wb.first_sheet().unwrap().cells().all(|(_, c)| c.style.fill.is_none()));
    }
}

#[test]
fn legend_follows_the_data() {
    let run = run();
    let a = run.annotated_a.first_sheet().unwrap();
    // Last fixture row is 8.
    assert_eq!(a.value(10, 0), &CellValue::Text(LEGEND_TITLE.to_string()));
    for (i, category) in HighlightCategory::ALL.into_iter().enumerate() {
        let row = 11 + i as u32;
        assert_eq!(a.value(row, 0), &CellValue::Text(category.label().to_string()));
        assert_eq!(fill(&run.annotated_a, row, 0), Some(category.argb()));
    }
}

#[test]
fn archive_holds_both_files_and_the_summary() {
    let run = run();
    let now = NaiveDate::from_ymd_opt(2026, 10, 16)
        .unwrap()
        .and_hms_opt(9, 5, 0)
        .unwrap();
    let zip_bytes = build_archive(
        NamedFile {
            name: "mua_vao.xlsx",
            bytes: &run.bytes_a,
        },
        NamedFile {
            name: "cong_thue.xlsx",
            bytes: &run.bytes_b,
        },
        &run.summary,
        now,
    )
    .unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
    let mut inner = Vec::new();
    archive
        .by_name("mua_vao_highlighted.xlsx")
        .unwrap()
        .read_to_end(&mut inner)
        .unwrap();
    let reread = read_workbook(&inner).unwrap();
    assert_eq!(fill(&reread, 7, 1), Some(HighlightCategory::Missing.argb()));

    assert!(archive.by_name("cong_thue_highlighted.xlsx").is_ok());

    let mut readme = String::new();
    archive
        .by_name(README_NAME)
        .unwrap()
        .read_to_string(&mut readme)
        .unwrap();
    assert!(readme.contains("File A: mua_vao_highlighted.xlsx (6 records)"));

    let mut json = Vec::new();
    archive.by_name(SUMMARY_NAME).unwrap().read_to_end(&mut json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value["summary"]["file_b"]["missing_rows"], 1);
}

#[test]
fn out_of_range_request_does_not_abort_export() {
    let original = read_workbook(&fixture_xlsx("file_b.tsv", Some(0))).unwrap();
    let mut plan = invoice_recon::HighlightPlan::default();
    plan.missing.insert(500);
    plan.missing.insert(6);

    let files = export_annotated(&original, &original, &plan, &plan).unwrap();
    assert_eq!(files.warnings.len(), 2);

    let annotated = read_workbook(&files.file_a).unwrap();
    assert_eq!(fill(&annotated, 6, 0), Some(HighlightCategory::Missing.argb()));
}
