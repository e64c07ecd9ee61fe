//! XLSX style parser: reads styles.xml and worksheet XML straight from the
//! zip container to recover what calamine does not expose (cell styles,
//! column widths, row heights, hidden rows/columns, merged regions).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Read, Seek};

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::IoError;
use crate::workbook::{
    Alignment, Argb, Border, BorderSide, BorderStyle, CellStyle, Font, HorizontalAlign,
    MergedRegion, Protection, VerticalAlign,
};

// =============================================================================
// Public types
// =============================================================================

/// Resolved `cellXfs` table: style id → `CellStyle`.
#[derive(Debug, Default)]
pub struct StyleTable {
    styles: Vec<CellStyle>,
}

impl StyleTable {
    pub fn get(&self, id: usize) -> Option<&CellStyle> {
        self.styles.get(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// Per-sheet layout and style references from one worksheet XML part.
#[derive(Debug, Default)]
pub struct SheetLayout {
    /// (row, col, style id), 0-based. Cells on style id 0 (explicit or
    /// implied) are omitted; `StyleTable::get(0)` is their base style.
    pub cell_styles: Vec<(u32, u16, usize)>,
    pub col_widths: BTreeMap<u16, f64>,
    pub row_heights: BTreeMap<u32, f64>,
    pub hidden_rows: BTreeSet<u32>,
    pub hidden_cols: BTreeSet<u16>,
    pub merged_regions: Vec<MergedRegion>,
}

// =============================================================================
// Colors
// =============================================================================

/// Legacy 64-entry indexed palette plus the two system colors.
fn indexed_color(idx: u8) -> Option<Argb> {
    const PALETTE: [u32; 56] = [
        0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
        0x800000, 0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080,
        0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF,
        0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF,
        0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99,
        0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696,
        0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993333, 0x333399, 0x333333,
    ];
    let rgb = match idx {
        0..=7 => PALETTE[idx as usize],
        8..=63 => PALETTE[idx as usize - 8],
        64 => 0x000000,
        65 => 0xFFFFFF,
        _ => return None,
    };
    Some(0xFF00_0000 | rgb)
}

/// Office default theme colors, before tint.
fn theme_color(idx: u8) -> Option<Argb> {
    let rgb = match idx {
        0 => 0xFFFFFF,
        1 => 0x000000,
        2 => 0xEEECE1,
        3 => 0x1F497D,
        4 => 0x4F81BD,
        5 => 0xC0504D,
        6 => 0x9BBB59,
        7 => 0x8064A2,
        8 => 0x4BACC6,
        9 => 0xF79646,
        _ => return None,
    };
    Some(0xFF00_0000 | rgb)
}

/// `AARRGGBB` or `RRGGBB`, optional leading `#`.
pub fn parse_argb_hex(hex: &str) -> Option<Argb> {
    let s = hex.trim_start_matches('#');
    match s.len() {
        8 => u32::from_str_radix(s, 16).ok(),
        6 => u32::from_str_radix(s, 16).ok().map(|rgb| 0xFF00_0000 | rgb),
        _ => None,
    }
}

/// Color from a `<color>`, `<fgColor>` or `<bgColor>` element: rgb > indexed > theme,
/// then `tint` applied.
fn parse_color(e: &BytesStart) -> Option<Argb> {
    let base = if let Some(rgb) = attr(e, b"rgb") {
        parse_argb_hex(&rgb)
    } else if let Some(idx) = attr(e, b"indexed").and_then(|s| s.parse().ok()) {
        indexed_color(idx)
    } else {
        attr(e, b"theme")
            .and_then(|s| s.parse().ok())
            .and_then(theme_color)
    }?;
    let tint = attr(e, b"tint")
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    Some(apply_tint(base, tint))
}

/// Excel tint: shifts HSL luminance toward black (tint < 0) or white (tint > 0).
pub fn apply_tint(argb: Argb, tint: f64) -> Argb {
    if tint == 0.0 || !tint.is_finite() {
        return argb;
    }
    let tint = tint.clamp(-1.0, 1.0);
    let channel = |shift: u32| f64::from((argb >> shift) & 0xFF) / 255.0;
    let (r, g, b) = (channel(16), channel(8), channel(0));

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let lum = (max + min) / 2.0;
    let (hue, sat) = if delta == 0.0 {
        (0.0, 0.0)
    } else {
        let sat = delta / (1.0 - (2.0 * lum - 1.0).abs());
        let sector = if max == r {
            ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };
        (sector, sat)
    };

    let lum = if tint < 0.0 {
        lum * (1.0 + tint)
    } else {
        lum * (1.0 - tint) + tint
    }
    .clamp(0.0, 1.0);

    let chroma = (1.0 - (2.0 * lum - 1.0).abs()) * sat;
    let x = chroma * (1.0 - (hue.rem_euclid(2.0) - 1.0).abs());
    let m = lum - chroma / 2.0;
    let (r, g, b) = match hue as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u32;
    (argb & 0xFF00_0000) | (to_byte(r) << 16) | (to_byte(g) << 8) | to_byte(b)
}

// =============================================================================
// Number formats
// =============================================================================

/// Format code for a built-in `numFmtId`. `None` means General.
fn builtin_number_format(id: u16) -> Option<&'static str> {
    let code = match id {
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "m/d/yyyy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yyyy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    };
    Some(code)
}

/// `<numFmts>` → id to format code.
fn parse_num_fmts(xml: &str) -> HashMap<u16, String> {
    let mut map = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_num_fmts = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"numFmts" => in_num_fmts = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"numFmts" => break,
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if in_num_fmts && e.name().as_ref() == b"numFmt" =>
            {
                let id = attr(e, b"numFmtId").and_then(|s| s.parse().ok());
                if let (Some(id), Some(code)) = (id, attr(e, b"formatCode")) {
                    map.insert(id, code);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    map
}

// =============================================================================
// Fonts, fills, borders
// =============================================================================

fn parse_fonts(xml: &str) -> Vec<Font> {
    let mut fonts = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 1 = in <fonts>, 2 = in <font>
    let mut current = Font::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fonts" if depth == 0 => depth = 1,
                b"font" if depth == 1 => {
                    depth = 2;
                    current = Font::default();
                }
                b"color" if depth == 2 => current.color = parse_color(e),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if depth == 2 => match e.name().as_ref() {
                b"b" => current.bold = attr_flag_default_on(e),
                b"i" => current.italic = attr_flag_default_on(e),
                b"strike" => current.strikethrough = attr_flag_default_on(e),
                b"u" => current.underline = attr(e, b"val").as_deref() != Some("none"),
                b"sz" => current.size = attr(e, b"val").and_then(|s| s.parse().ok()),
                b"color" => current.color = parse_color(e),
                b"name" | b"rFont" => current.name = attr(e, b"val"),
                _ => {}
            },
            // <font/> with no children
            Ok(Event::Empty(ref e)) if depth == 1 && e.name().as_ref() == b"font" => {
                fonts.push(Font::default());
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"font" if depth == 2 => {
                    fonts.push(std::mem::take(&mut current));
                    depth = 1;
                }
                b"fonts" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fonts
}

/// `<fills>` → solid fill color per fill id.
fn parse_fills(xml: &str) -> Vec<Option<Argb>> {
    let mut fills = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0;
    let mut pattern_none = true;
    let mut current: Option<Argb> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) if depth == 1 && e.name().as_ref() == b"fill" => {
                fills.push(None);
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"fills" if depth == 0 => depth = 1,
                b"fill" if depth == 1 => {
                    depth = 2;
                    current = None;
                    pattern_none = true;
                }
                b"patternFill" if depth == 2 => {
                    pattern_none = matches!(attr(e, b"patternType").as_deref(), None | Some("none"));
                }
                b"fgColor" if depth == 2 && !pattern_none => current = parse_color(e),
                b"gradientFill" if depth == 2 => {
                    log::debug!("gradient fill dropped on import");
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"fill" if depth == 2 => {
                    fills.push(current.take());
                    depth = 1;
                }
                b"fills" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fills
}

fn parse_border_style(s: &str) -> BorderStyle {
    match s {
        "hair" => BorderStyle::Hair,
        "thin" => BorderStyle::Thin,
        "medium" | "mediumDashDot" | "mediumDashDotDot" | "slantDashDot" => BorderStyle::Medium,
        "mediumDashed" | "dashed" | "dashDot" | "dashDotDot" => BorderStyle::Dashed,
        "dotted" => BorderStyle::Dotted,
        "thick" => BorderStyle::Thick,
        "double" => BorderStyle::Double,
        _ => BorderStyle::None,
    }
}

fn border_side_mut<'a>(border: &'a mut Border, name: &[u8]) -> Option<&'a mut BorderSide> {
    match name {
        b"top" => Some(&mut border.top),
        b"right" | b"end" => Some(&mut border.right),
        b"bottom" => Some(&mut border.bottom),
        b"left" | b"start" => Some(&mut border.left),
        _ => None,
    }
}

/// `<color>` inside an open side element.
fn set_side_color(border: &mut Border, side: Option<&[u8]>, e: &BytesStart) {
    let Some(name) = side else {
        return;
    };
    if let Some(target) = border_side_mut(border, name) {
        target.color = parse_color(e);
    }
}

fn parse_borders(xml: &str) -> Vec<Border> {
    let mut borders = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0;
    let mut current = Border::default();
    let mut side: Option<Vec<u8>> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"borders" if depth == 0 => depth = 1,
                    b"border" if depth == 1 => {
                        depth = 2;
                        current = Border::default();
                    }
                    b"color" if depth == 2 => set_side_color(&mut current, side.as_deref(), e),
                    other if depth == 2 => {
                        if let Some(s) = border_side_mut(&mut current, other) {
                            s.style = attr(e, b"style")
                                .map(|v| parse_border_style(&v))
                                .unwrap_or_default();
                            side = Some(name.clone());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) if depth == 2 => {
                let name = e.name().as_ref().to_vec();
                if name.as_slice() == b"color" {
                    set_side_color(&mut current, side.as_deref(), e);
                } else if let Some(s) = border_side_mut(&mut current, &name) {
                    s.style = attr(e, b"style")
                        .map(|v| parse_border_style(&v))
                        .unwrap_or_default();
                }
            }
            Ok(Event::Empty(ref e)) if depth == 1 && e.name().as_ref() == b"border" => {
                borders.push(Border::default());
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"border" if depth == 2 => {
                    borders.push(current);
                    depth = 1;
                    side = None;
                }
                b"borders" if depth == 1 => break,
                n if depth == 2 && side.as_deref() == Some(n) => side = None,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    borders
}

// =============================================================================
// cellXfs
// =============================================================================

#[derive(Debug, Default)]
struct XfEntry {
    num_fmt_id: Option<u16>,
    font_id: Option<usize>,
    fill_id: Option<usize>,
    border_id: Option<usize>,
    alignment: Alignment,
    protection: Protection,
}

impl XfEntry {
    fn from_attrs(e: &BytesStart) -> Self {
        let id = |key: &[u8]| attr(e, key).and_then(|s| s.parse::<usize>().ok());
        Self {
            num_fmt_id: attr(e, b"numFmtId").and_then(|s| s.parse().ok()),
            font_id: id(b"fontId"),
            fill_id: id(b"fillId"),
            border_id: id(b"borderId"),
            ..Self::default()
        }
    }

    fn read_alignment(&mut self, e: &BytesStart) {
        if let Some(h) = attr(e, b"horizontal") {
            self.alignment.horizontal = match h.as_str() {
                "left" => HorizontalAlign::Left,
                "center" => HorizontalAlign::Center,
                "right" => HorizontalAlign::Right,
                "fill" => HorizontalAlign::Fill,
                "justify" | "distributed" => HorizontalAlign::Justify,
                "centerContinuous" => HorizontalAlign::CenterAcross,
                _ => HorizontalAlign::General,
            };
        }
        if let Some(v) = attr(e, b"vertical") {
            self.alignment.vertical = match v.as_str() {
                "top" => VerticalAlign::Top,
                "center" => VerticalAlign::Center,
                _ => VerticalAlign::Bottom,
            };
        }
        self.alignment.wrap_text = attr_flag(e, b"wrapText");
    }

    fn read_protection(&mut self, e: &BytesStart) {
        if let Some(v) = attr(e, b"locked") {
            self.protection.locked = is_true(&v);
        }
        if let Some(v) = attr(e, b"hidden") {
            self.protection.hidden = is_true(&v);
        }
    }

    fn resolve(
        &self,
        num_fmts: &HashMap<u16, String>,
        fonts: &[Font],
        fills: &[Option<Argb>],
        borders: &[Border],
    ) -> CellStyle {
        let number_format = self.num_fmt_id.and_then(|id| {
            num_fmts
                .get(&id)
                .cloned()
                .or_else(|| builtin_number_format(id).map(str::to_string))
        });
        CellStyle {
            font: self
                .font_id
                .and_then(|i| fonts.get(i))
                .cloned()
                .unwrap_or_default(),
            fill: self.fill_id.and_then(|i| fills.get(i).copied().flatten()),
            border: self
                .border_id
                .and_then(|i| borders.get(i))
                .copied()
                .unwrap_or_default(),
            alignment: self.alignment,
            number_format,
            protection: self.protection,
        }
    }
}

/// Parse styles.xml into a style table indexed by `cellXfs` position.
pub fn parse_styles_xml(xml: &str) -> StyleTable {
    let num_fmts = parse_num_fmts(xml);
    let fonts = parse_fonts(xml);
    let fills = parse_fills(xml);
    let borders = parse_borders(xml);

    let mut styles = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;
    let mut current: Option<XfEntry> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => current = Some(XfEntry::from_attrs(e)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"xf" if in_cell_xfs => {
                    let xf = XfEntry::from_attrs(e);
                    styles.push(xf.resolve(&num_fmts, &fonts, &fills, &borders));
                }
                b"alignment" => {
                    if let Some(xf) = current.as_mut() {
                        xf.read_alignment(e);
                    }
                }
                b"protection" => {
                    if let Some(xf) = current.as_mut() {
                        xf.read_protection(e);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"xf" => {
                    if let Some(xf) = current.take() {
                        styles.push(xf.resolve(&num_fmts, &fonts, &fills, &borders));
                    }
                }
                b"cellXfs" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    StyleTable { styles }
}

// =============================================================================
// Worksheet XML
// =============================================================================

/// Parse one worksheet part for style ids and layout.
pub fn parse_sheet_layout(xml: &str) -> SheetLayout {
    let mut layout = SheetLayout::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"row" => {
                    let Some(row) = attr(e, b"r")
                        .and_then(|s| s.parse::<u32>().ok())
                        .map(|r| r.saturating_sub(1))
                    else {
                        buf.clear();
                        continue;
                    };
                    if attr_flag(e, b"customHeight") {
                        if let Some(ht) = attr(e, b"ht").and_then(|s| s.parse().ok()) {
                            layout.row_heights.insert(row, ht);
                        }
                    }
                    if attr_flag(e, b"hidden") {
                        layout.hidden_rows.insert(row);
                    }
                }
                b"c" => {
                    let style = attr(e, b"s").and_then(|s| s.parse::<usize>().ok());
                    let cell = attr(e, b"r").and_then(|r| parse_cell_ref(&r));
                    if let (Some(style), Some((row, col))) = (style, cell) {
                        if style > 0 {
                            layout.cell_styles.push((row, col, style));
                        }
                    }
                }
                b"col" => {
                    let bound = |key: &[u8]| {
                        attr(e, key)
                            .and_then(|s| s.parse::<u16>().ok())
                            .map(|c| c.saturating_sub(1))
                    };
                    let (Some(min), Some(max)) = (bound(b"min"), bound(b"max")) else {
                        buf.clear();
                        continue;
                    };
                    let width = attr(e, b"width").and_then(|s| s.parse::<f64>().ok());
                    let custom = attr_flag(e, b"customWidth");
                    let hidden = attr_flag(e, b"hidden");
                    // Open-ended ranges (max=16384) only matter when hidden.
                    for col in min..=max.min(min.saturating_add(1024)) {
                        if let (true, Some(w)) = (custom, width) {
                            layout.col_widths.insert(col, w);
                        }
                        if hidden {
                            layout.hidden_cols.insert(col);
                        }
                    }
                }
                b"mergeCell" => {
                    match attr(e, b"ref").and_then(|r| parse_merge_ref(&r)) {
                        Some(region) if region.is_single_cell() => {
                            log::debug!("single-cell merge {region:?} dropped on import");
                        }
                        Some(region) => layout.merged_regions.push(region),
                        None => {}
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    layout
}

/// `"A1:C3"` → merged region. A single reference is a 1×1 region.
pub fn parse_merge_ref(r: &str) -> Option<MergedRegion> {
    let (start, end) = r.split_once(':').unwrap_or((r, r));
    let (sr, sc) = parse_cell_ref(start)?;
    let (er, ec) = parse_cell_ref(end)?;
    Some(MergedRegion::new(sr, sc, er, ec))
}

/// `"B5"` → (4, 1). Absolute markers (`$`) are ignored.
pub fn parse_cell_ref(r: &str) -> Option<(u32, u16)> {
    let r = r.replace('$', "");
    let split = r.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = r.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut col: u32 = 0;
    for ch in letters.chars() {
        col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        if col > 16_384 {
            return None;
        }
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, (col - 1) as u16))
}

// =============================================================================
// Entry point
// =============================================================================

/// Read the style table and one layout per sheet name (same order) from
/// xlsx bytes. Missing optional parts give empty results rather than errors.
pub fn read_formatting(
    bytes: &[u8],
    sheet_names: &[String],
) -> Result<(StyleTable, Vec<SheetLayout>), IoError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IoError::Read(format!("not an xlsx container: {e}")))?;

    let styles = match read_zip_file(&mut archive, "xl/styles.xml") {
        Some(xml) => parse_styles_xml(&xml),
        None => {
            log::warn!("xl/styles.xml missing, cell styles not imported");
            StyleTable::default()
        }
    };

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml").unwrap_or_default();
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels").unwrap_or_default();
    let paths = worksheet_paths(&workbook_xml, &rels_xml, sheet_names);

    let layouts = paths
        .iter()
        .zip(sheet_names)
        .map(|(path, name)| match path.as_deref().and_then(|p| read_zip_file(&mut archive, p)) {
            Some(xml) => parse_sheet_layout(&xml),
            None => {
                log::warn!("worksheet part for '{name}' not found, layout not imported");
                SheetLayout::default()
            }
        })
        .collect();

    Ok((styles, layouts))
}

// =============================================================================
// Helpers
// =============================================================================

fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    let a = e.attributes().flatten().find(|a| a.key.as_ref() == key)?;
    let raw = String::from_utf8_lossy(&a.value);
    match unescape(&raw) {
        Ok(v) => Some(v.into_owned()),
        Err(_) => Some(raw.into_owned()),
    }
}

fn is_true(v: &str) -> bool {
    v == "1" || v == "true"
}

fn attr_flag(e: &BytesStart, key: &[u8]) -> bool {
    attr(e, key).is_some_and(|v| is_true(&v))
}

/// `<b/>` means on; `<b val="0"/>` means off.
fn attr_flag_default_on(e: &BytesStart) -> bool {
    attr(e, b"val").map_or(true, |v| is_true(&v))
}

fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Option<String> {
    let mut file = archive.by_name(path).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Worksheet part path for each sheet name, via workbook.xml and its rels.
fn worksheet_paths(workbook_xml: &str, rels_xml: &str, sheet_names: &[String]) -> Vec<Option<String>> {
    let mut name_to_rid: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"sheet" => {
                if let (Some(name), Some(rid)) = (attr(e, b"name"), attr(e, b"r:id")) {
                    name_to_rid.insert(name, rid);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let mut rid_to_target: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(e, b"Id"), attr(e, b"Target")) {
                    rid_to_target.insert(id, target);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    sheet_names
        .iter()
        .map(|name| {
            let target = rid_to_target.get(name_to_rid.get(name)?)?;
            // Targets are relative to xl/ unless absolute within the package.
            Some(match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("xl/{target}"),
            })
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
