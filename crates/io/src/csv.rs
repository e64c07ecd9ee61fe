// CSV/TSV import into engine rows

use invoice_recon::model::{RawCell, RawRow};

use crate::error::IoError;

/// Parse CSV/TSV bytes into positional rows. The delimiter is sniffed;
/// every non-empty field stays text, empty fields become `RawCell::Empty`.
/// Completely blank lines are not rows.
pub fn read_rows(bytes: &[u8]) -> Result<Vec<RawRow>, IoError> {
    let content = decode(bytes);
    let delimiter = sniff_delimiter(&content);
    read_rows_with_delimiter(&content, delimiter)
}

pub fn read_rows_with_delimiter(content: &str, delimiter: u8) -> Result<Vec<RawRow>, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| IoError::Read(format!("CSV row {}: {e}", row_idx + 1)))?;
        let mut row: RawRow = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    RawCell::Empty
                } else {
                    RawCell::Text(field.to_string())
                }
            })
            .collect();
        while row.last().is_some_and(|c| *c == RawCell::Empty) {
            row.pop();
        }
        rows.push(row);
    }

    log::debug!(
        "read {} CSV rows (delimiter {:?})",
        rows.len(),
        delimiter as char
    );
    Ok(rows)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let Some(&target) = counts.first() else {
            break;
        };
        if target <= 1 {
            continue;
        }

        // Ties go to the wider split.
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// UTF-8 (BOM stripped), falling back to Windows-1252 for Excel exports.
fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}
