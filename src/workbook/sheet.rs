//! Workbook sheet loading
//!
//! Thin calamine adapter: reads the first worksheet into string cells and
//! locates the header row. Everything downstream works on plain strings so
//! the counting and extraction logic stays testable without real files.

use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};

use super::columns::STATUS_CANDIDATES;
use super::WorkbookError;

/// One worksheet, split at the detected header row
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Build from raw rows, hunting for the header row.
    ///
    /// The header row is the first row containing a status column
    /// candidate (case-insensitive); rows above it are template junk and
    /// dropped. When no sentinel matches, the first row is the header so
    /// a status-less workbook still degrades to a `not_run` summary.
    pub fn from_rows(raw: Vec<Vec<String>>) -> Result<Self, WorkbookError> {
        if raw.is_empty() {
            return Err(WorkbookError::Empty);
        }
        let header_idx = raw
            .iter()
            .position(|row| {
                row.iter().any(|cell| {
                    let cell = cell.trim();
                    STATUS_CANDIDATES.iter().any(|c| cell.eq_ignore_ascii_case(c))
                })
            })
            .unwrap_or(0);

        let headers = raw[header_idx].clone();
        let rows = raw[header_idx + 1..].to_vec();
        Ok(Self { headers, rows })
    }

    /// Load the first worksheet of an `.xlsx` file.
    pub fn load(path: &Path) -> Result<Self, WorkbookError> {
        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e: calamine::XlsxError| WorkbookError::Open(path.display().to_string(), e.to_string()))?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(WorkbookError::NoSheets)?;
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| WorkbookError::Open(path.display().to_string(), e.to_string()))?;

        let raw: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        Self::from_rows(raw)
    }
}

/// Render a cell as the string the sheet author typed, best effort.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            // Integers stored as floats come back as "3" not "3.0"
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        other => other.to_string(),
    }
}
