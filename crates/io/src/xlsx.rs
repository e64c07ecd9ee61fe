//! XLSX import/export: values through calamine, formatting through
//! [`crate::xlsx_styles`], writing through rust_xlsxwriter.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use invoice_recon::model::{RawCell, RawRow};
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatPattern, FormatUnderline,
    Workbook as XlsxWorkbook, Worksheet,
};

use crate::error::IoError;
use crate::workbook::{
    BorderSide, BorderStyle, CellStyle, CellValue, HorizontalAlign, Sheet, VerticalAlign, Workbook,
};
use crate::xlsx_styles;

// =============================================================================
// Import
// =============================================================================

/// Parse xlsx bytes into a workbook with values, styles, merges and layout
/// for every sheet.
pub fn read_workbook(bytes: &[u8]) -> Result<Workbook, IoError> {
    let mut xlsx: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e| IoError::Read(format!("failed to open workbook: {e}")))?;

    let sheet_names: Vec<String> = xlsx.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(IoError::Read("workbook contains no sheets".to_string()));
    }

    let (styles, layouts) = xlsx_styles::read_formatting(bytes, &sheet_names)?;

    let mut workbook = Workbook::new();
    for (name, layout) in sheet_names.iter().zip(layouts) {
        let range = xlsx
            .worksheet_range(name)
            .map_err(|e| IoError::Read(format!("failed to read sheet '{name}': {e}")))?;

        let mut sheet = Sheet::new(name.clone());
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        for (row_idx, row) in range.rows().enumerate() {
            for (col_idx, data) in row.iter().enumerate() {
                let value = convert_data(data);
                if value == CellValue::Empty {
                    continue;
                }
                let col = start_col as usize + col_idx;
                let Ok(col) = u16::try_from(col) else {
                    continue;
                };
                sheet.set_value(start_row + row_idx as u32, col, value);
            }
        }

        // Cells with no `s` attribute, or `s="0"`, carry the workbook default xf.
        if let Some(base) = styles.get(0).filter(|style| !style.is_default()) {
            let valued: Vec<(u32, u16)> = sheet.cells().map(|(pos, _)| pos).collect();
            for (row, col) in valued {
                sheet.set_style(row, col, base.clone());
            }
        }
        for (row, col, style_id) in layout.cell_styles {
            if let Some(style) = styles.get(style_id) {
                sheet.set_style(row, col, style.clone());
            }
        }
        sheet.merged_regions = layout.merged_regions;
        sheet.col_widths = layout.col_widths;
        sheet.row_heights = layout.row_heights;
        sheet.hidden_rows = layout.hidden_rows;
        sheet.hidden_cols = layout.hidden_cols;

        log::debug!(
            "read sheet '{}': {} rows, {} merged regions",
            sheet.name,
            sheet.row_count(),
            sheet.merged_regions.len()
        );
        workbook.add_sheet(sheet);
    }

    Ok(workbook)
}

fn convert_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        // Keep the serial so the number format renders it as before.
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

/// First sheet as positional rows for the comparison engine. Row `i` is
/// sheet row `i`; trailing empty cells are dropped.
pub fn to_row_array(workbook: &Workbook) -> Vec<RawRow> {
    let Some(sheet) = workbook.first_sheet() else {
        return Vec::new();
    };

    (0..sheet.row_count() as u32)
        .map(|row| {
            let mut cells: RawRow = Vec::new();
            for (col, cell) in sheet.row_cells(row) {
                if cell.value.is_blank() {
                    continue;
                }
                let col = col as usize;
                if cells.len() < col {
                    cells.resize(col, RawCell::Empty);
                }
                cells.push(raw_cell(&cell.value));
            }
            cells
        })
        .collect()
}

fn raw_cell(value: &CellValue) -> RawCell {
    match value {
        CellValue::Empty => RawCell::Empty,
        CellValue::Text(s) => RawCell::Text(s.clone()),
        CellValue::Number(n) => RawCell::Number(*n),
        CellValue::Bool(b) => RawCell::Bool(*b),
    }
}

// =============================================================================
// Export
// =============================================================================

/// Serialize a workbook to xlsx bytes. Any writer error fails the whole
/// export; no partial buffer is returned.
pub fn write_workbook(workbook: &Workbook) -> Result<Vec<u8>, IoError> {
    let mut out = XlsxWorkbook::new();

    for sheet in &workbook.sheets {
        let worksheet = out
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| serialization(format!("sheet '{}': {e}", sheet.name)))?;
        write_sheet(sheet, worksheet)?;
    }

    out.save_to_buffer()
        .map_err(|e| serialization(format!("failed to build xlsx: {e}")))
}

fn write_sheet(sheet: &Sheet, worksheet: &mut Worksheet) -> Result<(), IoError> {
    let at = |row: u32, col: u16| format!("sheet '{}' {}", sheet.name, cell_address(row, col));

    // merge_range() writes blanks across the region; the origin value is
    // written over it below.
    for merge in &sheet.merged_regions {
        if merge.is_single_cell() {
            log::debug!("{}: single-cell merge skipped", at(merge.first_row, merge.first_col));
            continue;
        }
        let format = sheet
            .cell(merge.first_row, merge.first_col)
            .map(|c| build_format(&c.style))
            .unwrap_or_default();
        worksheet
            .merge_range(
                merge.first_row,
                merge.first_col,
                merge.last_row,
                merge.last_col,
                "",
                &format,
            )
            .map_err(|e| serialization(format!("{}: merge failed: {e}", at(merge.first_row, merge.first_col))))?;
    }

    for ((row, col), cell) in sheet.cells() {
        if sheet.is_merge_hidden(row, col) {
            continue;
        }
        let format = build_format(&cell.style);
        let written = match &cell.value {
            CellValue::Empty if cell.style.is_default() => continue,
            CellValue::Empty => worksheet.write_blank(row, col, &format).map(|_| ()),
            CellValue::Text(s) => worksheet
                .write_string_with_format(row, col, s, &format)
                .map(|_| ()),
            CellValue::Number(n) => worksheet
                .write_number_with_format(row, col, *n, &format)
                .map(|_| ()),
            CellValue::Bool(b) => worksheet
                .write_boolean_with_format(row, col, *b, &format)
                .map(|_| ()),
        };
        written.map_err(|e| serialization(format!("{}: {e}", at(row, col))))?;
    }

    for (&col, &width) in &sheet.col_widths {
        worksheet
            .set_column_width(col, char_width(width))
            .map_err(|e| serialization(format!("column {col} width: {e}")))?;
    }
    for (&row, &height) in &sheet.row_heights {
        worksheet
            .set_row_height(row, height)
            .map_err(|e| serialization(format!("row {row} height: {e}")))?;
    }
    for &row in &sheet.hidden_rows {
        worksheet
            .set_row_hidden(row)
            .map_err(|e| serialization(format!("hide row {row}: {e}")))?;
    }
    for &col in &sheet.hidden_cols {
        worksheet
            .set_column_hidden(col)
            .map_err(|e| serialization(format!("hide column {col}: {e}")))?;
    }

    Ok(())
}

/// Stored OOXML column width back to the character width the writer takes.
/// The writer adds 5px of padding at a 7px digit width; undo that so a
/// read/write cycle keeps the stored value.
fn char_width(stored: f64) -> f64 {
    if stored <= 0.0 {
        return 0.0;
    }
    let chars = (stored * 7.0 - 5.0) / 7.0;
    if chars >= 1.0 {
        chars
    } else {
        stored * 7.0 / 12.0
    }
}

fn serialization(msg: String) -> IoError {
    IoError::Serialization(msg)
}

fn rgb(argb: u32) -> Color {
    Color::RGB(argb & 0x00FF_FFFF)
}

/// Map a cell style onto a writer format.
pub(crate) fn build_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    let font = &style.font;
    if font.bold {
        format = format.set_bold();
    }
    if font.italic {
        format = format.set_italic();
    }
    if font.underline {
        format = format.set_underline(FormatUnderline::Single);
    }
    if font.strikethrough {
        format = format.set_font_strikethrough();
    }
    if let Some(size) = font.size {
        format = format.set_font_size(size);
    }
    if let Some(color) = font.color {
        format = format.set_font_color(rgb(color));
    }
    if let Some(ref name) = font.name {
        format = format.set_font_name(name);
    }

    if let Some(fill) = style.fill {
        format = format
            .set_pattern(FormatPattern::Solid)
            .set_background_color(rgb(fill));
    }

    let border = &style.border;
    if let Some((kind, color)) = border_format(border.top) {
        format = format.set_border_top(kind);
        if let Some(c) = color {
            format = format.set_border_top_color(c);
        }
    }
    if let Some((kind, color)) = border_format(border.right) {
        format = format.set_border_right(kind);
        if let Some(c) = color {
            format = format.set_border_right_color(c);
        }
    }
    if let Some((kind, color)) = border_format(border.bottom) {
        format = format.set_border_bottom(kind);
        if let Some(c) = color {
            format = format.set_border_bottom_color(c);
        }
    }
    if let Some((kind, color)) = border_format(border.left) {
        format = format.set_border_left(kind);
        if let Some(c) = color {
            format = format.set_border_left_color(c);
        }
    }

    format = match style.alignment.horizontal {
        HorizontalAlign::General => format,
        HorizontalAlign::Left => format.set_align(FormatAlign::Left),
        HorizontalAlign::Center => format.set_align(FormatAlign::Center),
        HorizontalAlign::Right => format.set_align(FormatAlign::Right),
        HorizontalAlign::Fill => format.set_align(FormatAlign::Fill),
        HorizontalAlign::Justify => format.set_align(FormatAlign::Justify),
        HorizontalAlign::CenterAcross => format.set_align(FormatAlign::CenterAcross),
    };
    format = match style.alignment.vertical {
        VerticalAlign::Bottom => format,
        VerticalAlign::Center => format.set_align(FormatAlign::VerticalCenter),
        VerticalAlign::Top => format.set_align(FormatAlign::Top),
    };
    if style.alignment.wrap_text {
        format = format.set_text_wrap();
    }

    if let Some(ref code) = style.number_format {
        format = format.set_num_format(code);
    }

    if !style.protection.locked {
        format = format.set_unlocked();
    }
    if style.protection.hidden {
        format = format.set_hidden();
    }

    format
}

fn border_format(side: BorderSide) -> Option<(FormatBorder, Option<Color>)> {
    let kind = match side.style {
        BorderStyle::None => return None,
        BorderStyle::Hair => FormatBorder::Hair,
        BorderStyle::Thin => FormatBorder::Thin,
        BorderStyle::Medium => FormatBorder::Medium,
        BorderStyle::Thick => FormatBorder::Thick,
        BorderStyle::Dashed => FormatBorder::Dashed,
        BorderStyle::Dotted => FormatBorder::Dotted,
        BorderStyle::Double => FormatBorder::Double,
    };
    Some((kind, side.color.map(rgb)))
}

/// 0-based (row, col) → `"B5"`.
fn cell_address(row: u32, col: u16) -> String {
    let mut letters = String::new();
    let mut n = col as u32 + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    format!("{letters}{}", row + 1)
}
