//! Spreadsheet extraction (XLSX / XLS / ODS) via calamine.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use tracing::warn;

use super::{ExtractError, RawExtraction};
use crate::models::SourceFormat;

const ROWS_PER_PAGE: usize = 50;
const CELL_SEPARATOR: &str = " | ";

pub(crate) fn extract_spreadsheet(bytes: &[u8]) -> Result<RawExtraction, ExtractError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ExtractError::corrupt(SourceFormat::Spreadsheet, e.to_string()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        match workbook.worksheet_range(&name) {
            Ok(range) => {
                let rows = range
                    .rows()
                    .map(|row| row.iter().map(cell_to_string).collect())
                    .collect();
                sheets.push((name, rows));
            }
            Err(e) => warn!(sheet = %name, error = %e, "Skipping unreadable sheet"),
        }
    }

    let (text, row_count) = flatten_sheets(&sheets);
    Ok(RawExtraction {
        text,
        page_count: row_count.div_ceil(ROWS_PER_PAGE).max(1) as u32,
        has_images: false,
        used_fallback_ocr: false,
    })
}

/// Flattens sheets row-major into pipe-delimited lines, each sheet opened by
/// a `=== Sheet: <name> ===` marker. Empty rows are skipped. Returns the text
/// and the number of rows written.
pub fn flatten_sheets(sheets: &[(String, Vec<Vec<String>>)]) -> (String, usize) {
    let mut out = String::new();
    let mut row_count = 0;

    for (name, rows) in sheets {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("=== Sheet: {name} ===\n"));

        for row in rows {
            let cells: Vec<&str> = row.iter().map(|c| c.trim()).collect();
            let last = match cells.iter().rposition(|c| !c.is_empty()) {
                Some(last) => last,
                None => continue,
            };
            out.push_str(&cells[..=last].join(CELL_SEPARATOR));
            out.push('\n');
            row_count += 1;
        }
    }
    (out, row_count)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 => format!("{f:.0}"),
        other => other.to_string(),
    }
}
