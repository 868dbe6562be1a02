//! Feature workbook parsing
//!
//! Each feature directory holds one Excel workbook with a test-case sheet
//! (`TestCaseNo` / `Execute` / `TestResult` / `Fail_Description` columns,
//! with naming variations handled by the column schema). This module turns
//! a workbook into a [`FeatureSummary`] and extracts per-row fields for
//! the report renderers.

pub mod columns;
pub mod evidence;
pub mod sheet;
pub mod types;

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use columns::{ColumnMap, Field};
use sheet::Sheet;
use types::{FeatureStatus, FeatureSummary, TestCaseFields};

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("cannot open {0}: {1}")]
    Open(String, String),
    #[error("workbook has no sheets")]
    NoSheets,
    #[error("worksheet is empty")]
    Empty,
}

/// Rows marked executable: `Execute` equals `y` case-insensitively, or
/// every row when the workbook has no Execute column.
pub fn executed_rows<'a>(sheet: &'a Sheet, cols: &ColumnMap) -> Vec<&'a Vec<String>> {
    sheet
        .rows
        .iter()
        .filter(|row| {
            if !cols.has(Field::Execute) {
                return true;
            }
            cols.cell(row, Field::Execute).eq_ignore_ascii_case("y")
        })
        .collect()
}

/// Resolve every logical field of one row.
pub fn extract_fields(cols: &ColumnMap, row: &[String]) -> TestCaseFields {
    TestCaseFields {
        id: cols.cell(row, Field::Id).to_string(),
        description: cols.cell(row, Field::Description).to_string(),
        status: cols.cell(row, Field::Status).to_string(),
        error: cols.cell(row, Field::Error).to_string(),
        expected: cols.cell(row, Field::Expected).to_string(),
    }
}

/// Parse one workbook into a feature summary.
///
/// Returns `None` when the file cannot be read or contains no executable
/// rows; a workbook without a recognisable status column still yields a
/// zero-count `not_run` summary. Failures never propagate so a single bad
/// file cannot abort a batch.
pub fn parse_feature_summary(workbook_path: &Path, results_root: &Path) -> Option<FeatureSummary> {
    let sheet = match Sheet::load(workbook_path) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Skipping {}: {}", workbook_path.display(), e);
            return None;
        }
    };

    let cols = ColumnMap::resolve(&sheet.headers);
    let run_timestamp = crate::scanner::extract_timestamp(workbook_path);
    let feature_name = crate::scanner::extract_feature_name(workbook_path);
    let workbook_rel = evidence::relative_path(results_root, workbook_path)
        .unwrap_or_else(|| workbook_path.display().to_string());

    if !cols.has(Field::Status) {
        log::warn!(
            "No status column in {}. Headers: {:?}",
            workbook_path.display(),
            sheet.headers
        );
        return Some(FeatureSummary {
            feature_name,
            workbook_path: workbook_rel,
            total: 0,
            passed: 0,
            failed: 0,
            pass_rate: 0.0,
            status: FeatureStatus::NotRun,
            run_timestamp,
            test_evidence: Default::default(),
        });
    }

    let executed = executed_rows(&sheet, &cols);
    if executed.is_empty() {
        log::warn!("No executable tests in {}", workbook_path.display());
        return None;
    }

    let mut passed = 0u32;
    let mut failed = 0u32;
    for row in &executed {
        let status = cols.cell(row, Field::Status);
        if status.eq_ignore_ascii_case("pass") {
            passed += 1;
        } else if status.eq_ignore_ascii_case("fail") {
            failed += 1;
        }
        // Blank, "skip" and typos are excluded from the total entirely
    }
    let total = passed + failed;
    let pass_rate = if total > 0 {
        round2(passed as f64 / total as f64 * 100.0)
    } else {
        0.0
    };
    let status = if total == 0 {
        FeatureStatus::NotRun
    } else if failed == 0 {
        FeatureStatus::Passed
    } else {
        FeatureStatus::Failed
    };

    let feature_dir = workbook_path.parent().unwrap_or(Path::new("."));
    let test_evidence = evidence::discover_evidence(feature_dir, results_root);

    Some(FeatureSummary {
        feature_name,
        workbook_path: workbook_rel,
        total,
        passed,
        failed,
        pass_rate,
        status,
        run_timestamp,
        test_evidence,
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Failed executed rows of one workbook as resolved field sets.
pub fn failed_cases(sheet: &Sheet, cols: &ColumnMap) -> Vec<TestCaseFields> {
    executed_rows(sheet, cols)
        .into_iter()
        .filter(|row| cols.cell(row, Field::Status).eq_ignore_ascii_case("fail"))
        .map(|row| extract_fields(cols, row))
        .collect()
}

/// Description lookup by test-case id: substring match first (folder names
/// often extend the id), exact match as fallback.
pub fn find_case_description(sheet: &Sheet, cols: &ColumnMap, case_id: &str) -> Option<String> {
    if !cols.has(Field::Id) || !cols.has(Field::Description) {
        return None;
    }
    let wanted = case_id.trim().to_lowercase();
    let contains = sheet.rows.iter().find(|row| {
        let id = cols.cell(row, Field::Id).to_lowercase();
        !id.is_empty() && id.contains(&wanted)
    });
    let exact = || {
        sheet
            .rows
            .iter()
            .find(|row| cols.cell(row, Field::Id).trim().eq_ignore_ascii_case(case_id.trim()))
    };
    let row = contains.or_else(exact)?;
    let description = cols.cell(row, Field::Description);
    if description.is_empty() {
        None
    } else {
        Some(description.to_string())
    }
}

/// First rows of a workbook for the dashboard preview pane
#[derive(Debug, Serialize)]
pub struct Preview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

const PREVIEW_ROWS: usize = 10;

pub fn preview(workbook_path: &Path) -> Result<Preview, WorkbookError> {
    let sheet = Sheet::load(workbook_path)?;
    Ok(Preview {
        headers: sheet.headers.clone(),
        rows: sheet.rows.iter().take(PREVIEW_ROWS).cloned().collect(),
        total_rows: sheet.rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(data: &[&[&str]]) -> Sheet {
        Sheet::from_rows(
            data.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    fn counts(sheet: &Sheet) -> (u32, u32, u32) {
        let cols = ColumnMap::resolve(&sheet.headers);
        let executed = executed_rows(sheet, &cols);
        let mut passed = 0;
        let mut failed = 0;
        for row in executed {
            let s = cols.cell(row, Field::Status);
            if s.eq_ignore_ascii_case("pass") {
                passed += 1;
            } else if s.eq_ignore_ascii_case("fail") {
                failed += 1;
            }
        }
        (passed + failed, passed, failed)
    }

    #[test]
    fn test_counting_excludes_unexecuted_and_blank() {
        let s = sheet(&[
            &["TestCaseNo", "Execute", "TestResult"],
            &["TC001", "Y", "Pass"],
            &["TC002", "Y", "Fail"],
            &["TC003", "N", "Pass"],
            &["TC004", "Y", ""],
        ]);
        assert_eq!(counts(&s), (2, 1, 1));
    }

    #[test]
    fn test_executed_rows_without_valid_status_count_nothing() {
        let s = sheet(&[
            &["TestCaseNo", "Execute", "TestResult"],
            &["TC001", "Y", ""],
            &["TC002", "Y", "skip"],
            &["TC003", "Y", "Passed"], // not an exact "pass"
        ]);
        assert_eq!(counts(&s), (0, 0, 0));
    }

    #[test]
    fn test_no_execute_column_counts_all() {
        let s = sheet(&[
            &["TestCaseNo", "TestResult"],
            &["TC001", "pass"],
            &["TC002", "PASS"],
            &["TC003", "skip"],
        ]);
        assert_eq!(counts(&s), (2, 2, 0));
    }

    #[test]
    fn test_failed_cases_extraction() {
        let s = sheet(&[
            &["TestCaseNo", "TestCaseDescription", "Execute", "TestResult", "Fail_Description"],
            &["TC001", "Login works", "Y", "Pass", ""],
            &["TC002", "Transfer fails", "Y", "Fail", "Timeout on confirm"],
            &["TC003", "Not run", "N", "Fail", "ignored"],
        ]);
        let cols = ColumnMap::resolve(&s.headers);
        let failed = failed_cases(&s, &cols);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, "TC002");
        assert_eq!(failed[0].error, "Timeout on confirm");
    }

    #[test]
    fn test_find_case_description() {
        let s = sheet(&[
            &["TestCaseNo", "TestCaseDescription", "TestResult"],
            &["TC001", "Login works", "Pass"],
            &["TC002", "Transfer", "Fail"],
        ]);
        let cols = ColumnMap::resolve(&s.headers);
        assert_eq!(
            find_case_description(&s, &cols, "TC002").as_deref(),
            Some("Transfer")
        );
        assert_eq!(find_case_description(&s, &cols, "TC999"), None);
    }

    #[test]
    fn test_parse_unreadable_workbook_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20250620-111221/Broken/Broken.xlsx");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not an xlsx").unwrap();
        assert!(parse_feature_summary(&path, dir.path()).is_none());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(2.0 / 3.0 * 100.0), 66.67);
        assert_eq!(round2(100.0), 100.0);
    }
}
