//! Worksheet ingestion - Excel (.xlsx) → in-memory rows

use crate::error::{DocmillError, DocmillResult};
use crate::types::{CellValue, Row, Worksheet, IDENTITY_COLUMN};
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Read a named worksheet into a [`Worksheet`].
///
/// Fatal conditions: file missing or unreadable, worksheet absent, no data
/// rows below the header, identity column (`Application / System`) absent.
pub fn read_worksheet(path: &Path, sheet_name: &str) -> DocmillResult<Worksheet> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| {
        DocmillError::Spreadsheet(format!("failed to open {}: {}", path.display(), e))
    })?;

    let range = workbook.worksheet_range(sheet_name).map_err(|_| {
        DocmillError::Spreadsheet(format!(
            "worksheet '{}' not found in {}",
            sheet_name,
            path.display()
        ))
    })?;

    let (height, width) = range.get_size();
    if height < 2 {
        return Err(DocmillError::Spreadsheet(format!(
            "worksheet '{}' has no data rows (header + at least one row required)",
            sheet_name
        )));
    }

    // The used range need not start at A1; everything stored on the
    // worksheet is in absolute sheet coordinates.
    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    // Header row (first row of the used range)
    let mut headers: Vec<String> = Vec::with_capacity(width);
    for col in 0..width {
        let name = match range.get((0, col)) {
            Some(Data::String(s)) => s.trim().to_string(),
            Some(Data::Int(i)) => i.to_string(),
            Some(Data::Float(f)) => f.to_string(),
            _ => format!("col_{}", start_col as usize + col),
        };
        headers.push(name);
    }

    if !headers.iter().any(|h| h == IDENTITY_COLUMN) {
        return Err(DocmillError::Spreadsheet(format!(
            "worksheet '{}' has no '{}' column",
            sheet_name, IDENTITY_COLUMN
        )));
    }

    // Data rows, numbered by their absolute 1-based sheet row
    let mut rows = Vec::with_capacity(height - 1);
    for row in 1..height {
        let mut cells = HashMap::with_capacity(width);
        for (col, header) in headers.iter().enumerate() {
            let value = match range.get((row, col)) {
                Some(Data::String(s)) => {
                    if s.trim().is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(s.clone())
                    }
                }
                Some(Data::Float(f)) => CellValue::Number(*f),
                Some(Data::Int(i)) => CellValue::Number(*i as f64),
                Some(Data::Bool(b)) => CellValue::Text(b.to_string()),
                Some(Data::DateTime(dt)) => CellValue::Number(dt.as_f64()),
                Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => {
                    CellValue::Text(s.clone())
                }
                _ => CellValue::Empty,
            };
            cells.insert(header.clone(), value);
        }
        rows.push(Row::new(start_row + row as u32 + 1, cells));
    }

    debug!(
        sheet = sheet_name,
        rows = rows.len(),
        columns = headers.len(),
        "worksheet ingested"
    );

    Ok(Worksheet {
        name: sheet_name.to_string(),
        headers,
        first_column: start_col,
        rows,
    })
}
