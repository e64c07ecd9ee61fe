//! Zip bundle: both highlighted files, a readme and a JSON summary.

use std::io::{Cursor, Write};

use chrono::NaiveDateTime;
use invoice_recon::model::FileSide;
use invoice_recon::plan::HighlightCategory;
use invoice_recon::summary::ComparisonSummary;
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::IoError;

pub const README_NAME: &str = "readme.txt";
pub const SUMMARY_NAME: &str = "summary.json";

/// An annotated file and the name of the upload it came from.
#[derive(Debug, Clone, Copy)]
pub struct NamedFile<'a> {
    pub name: &'a str,
    pub bytes: &'a [u8],
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    generated_at: String,
    file_a: &'a str,
    file_b: &'a str,
    summary: &'a ComparisonSummary,
}

/// `comparison_<d>-<m>-<yyyy>_<H>-<M>.zip`, fields unpadded.
pub fn archive_file_name(now: NaiveDateTime) -> String {
    now.format("comparison_%-d-%-m-%Y_%-H-%-M.zip").to_string()
}

/// `report.xlsx` → `report_highlighted.xlsx`. Directories are dropped; a
/// name without an extension gets `.xlsx`.
pub fn highlighted_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_highlighted.{ext}"),
        _ => format!("{base}_highlighted.xlsx"),
    }
}

/// Entry names for both files. Identical uploads get an `A_`/`B_` prefix so
/// neither entry shadows the other.
fn entry_names(a: &str, b: &str) -> (String, String) {
    let name_a = highlighted_name(a);
    let name_b = highlighted_name(b);
    if name_a == name_b {
        (format!("A_{name_a}"), format!("B_{name_b}"))
    } else {
        (name_a, name_b)
    }
}

/// Build the archive in memory.
pub fn build_archive(
    a: NamedFile<'_>,
    b: NamedFile<'_>,
    summary: &ComparisonSummary,
    now: NaiveDateTime,
) -> Result<Vec<u8>, IoError> {
    let (name_a, name_b) = entry_names(a.name, b.name);
    let readme = readme_text(&name_a, &name_b, summary, now);
    let document = SummaryDocument {
        generated_at: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
        file_a: &name_a,
        file_b: &name_b,
        summary,
    };
    let json = serde_json::to_vec_pretty(&document)
        .map_err(|e| IoError::Archive(format!("failed to encode {SUMMARY_NAME}: {e}")))?;

    let mut zip_writer = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let entries: [(&str, &[u8]); 4] = [
        (name_a.as_str(), a.bytes),
        (name_b.as_str(), b.bytes),
        (README_NAME, readme.as_bytes()),
        (SUMMARY_NAME, json.as_slice()),
    ];
    for (name, data) in entries {
        zip_writer
            .start_file(name, opts)
            .map_err(|e| IoError::Archive(format!("{name}: {e}")))?;
        zip_writer
            .write_all(data)
            .map_err(|e| IoError::Archive(format!("{name}: {e}")))?;
    }

    let cursor = zip_writer
        .finish()
        .map_err(|e| IoError::Archive(format!("failed to finish archive: {e}")))?;
    let bytes = cursor.into_inner();
    log::info!("built archive: {} bytes ({name_a}, {name_b})", bytes.len());
    Ok(bytes)
}

/// Human-readable counts per category per file, plus the color key.
pub fn readme_text(
    name_a: &str,
    name_b: &str,
    summary: &ComparisonSummary,
    now: NaiveDateTime,
) -> String {
    let mut out = String::new();
    out.push_str("INVOICE COMPARISON RESULT\n");
    out.push_str(&format!("Generated: {}\n", now.format("%-d-%-m-%Y %H:%M")));

    for (n, (side, name)) in [(FileSide::A, name_a), (FileSide::B, name_b)]
        .into_iter()
        .enumerate()
    {
        let file = summary.file(side);
        out.push_str(&format!(
            "\n{}. File {side_label}: {name} ({} records)\n",
            n + 1,
            file.records,
            side_label = if side == FileSide::A { "A" } else { "B" },
        ));
        for category in HighlightCategory::ALL {
            out.push_str(&format!(
                "   - {} ({}): {} rows flagged\n",
                category.label(),
                color_hex(category),
                file.rows(category)
            ));
        }
    }

    out.push_str("\nTotals:\n");
    out.push_str(&format!(
        "   - Invoice numbers with a differing tax code: {}\n",
        summary.mismatched_keys
    ));
    out.push_str(&format!(
        "   - Duplicate entries: {} ({} invoices)\n",
        summary.duplicate_entries, summary.duplicate_invoices
    ));
    out.push_str(&format!("   - Price anomalies: {}\n", summary.price_anomalies));
    if !summary.has_findings() {
        out.push_str("\nNo differences found.\n");
    }

    let mut by_precedence = HighlightCategory::ALL;
    by_precedence.sort_by_key(|c| std::cmp::Reverse(c.precedence()));
    let order: Vec<&str> = by_precedence.iter().map(|c| c.label()).collect();
    out.push_str(&format!(
        "\nA row flagged in several categories is colored once, first match in: {}.\n",
        order.join(" > ")
    ));
    out.push_str("Rows outside the sheet are not colored.\n");
    out.push_str("\nOnly cells holding a value are colored; the original formatting is kept.\n");
    out
}

fn color_hex(category: HighlightCategory) -> String {
    format!("#{:06X}", category.argb() & 0x00FF_FFFF)
}
