//! Column schema resolution
//!
//! Workbooks produced by different teams name their columns differently
//! (`TestResult` vs `Status`, `TestCaseNo` vs `Test Case ID`, ...). Each
//! logical field has an ordered candidate list; resolution happens once
//! per workbook and yields a field -> column index map.

use std::collections::HashMap;

/// Logical fields of the test-case sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Description,
    Status,
    Error,
    Expected,
    Execute,
}

/// Candidate header names per field, in priority order
pub const SCHEMA: &[(Field, &[&str])] = &[
    (
        Field::Id,
        &[
            "TestCaseNo",
            "Test Case ID",
            "TestCaseID",
            "Test Case",
            "ID",
            "TestCase",
        ],
    ),
    (
        Field::Description,
        &[
            "TestCaseDescription",
            "Test Case Description",
            "Description",
            "Test Description",
            "Name",
        ],
    ),
    (Field::Status, &["TestResult", "Status", "Result"]),
    (
        Field::Error,
        &[
            "Fail_Description",
            "TestResult_Description",
            "Result Description",
            "Error",
            "Message",
            "Failure Reason",
        ],
    ),
    (Field::Expected, &["ExpectedResult", "Expected Result", "Expected"]),
    (Field::Execute, &["Execute"]),
];

/// Header names that mark the header row when hunting for it
pub const STATUS_CANDIDATES: &[&str] = &["TestResult", "Status", "Result"];

/// Resolved field -> column index mapping for one workbook
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    indices: HashMap<Field, usize>,
}

impl ColumnMap {
    /// Resolve the schema against a header row, case-insensitively.
    pub fn resolve(headers: &[String]) -> Self {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut indices = HashMap::new();
        for (field, candidates) in SCHEMA {
            for candidate in *candidates {
                let wanted = candidate.to_lowercase();
                if let Some(idx) = lowered.iter().position(|h| *h == wanted) {
                    indices.insert(*field, idx);
                    break;
                }
            }
        }
        Self { indices }
    }

    pub fn get(&self, field: Field) -> Option<usize> {
        self.indices.get(&field).copied()
    }

    pub fn has(&self, field: Field) -> bool {
        self.indices.contains_key(&field)
    }

    /// Cell value for a field, trimmed; empty string when the column is
    /// missing or the row is short.
    pub fn cell<'a>(&self, row: &'a [String], field: Field) -> &'a str {
        self.get(field)
            .and_then(|idx| row.get(idx))
            .map(|s| s.trim())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_status_priority_order() {
        // TestResult wins over Status even when Status comes first
        let map = ColumnMap::resolve(&headers(&["Status", "TestResult"]));
        assert_eq!(map.get(Field::Status), Some(1));
    }

    #[test]
    fn test_case_insensitive_match() {
        let map = ColumnMap::resolve(&headers(&["testcaseno", "EXECUTE", "testresult"]));
        assert_eq!(map.get(Field::Id), Some(0));
        assert_eq!(map.get(Field::Execute), Some(1));
        assert_eq!(map.get(Field::Status), Some(2));
    }

    #[test]
    fn test_missing_fields() {
        let map = ColumnMap::resolve(&headers(&["Foo", "Bar"]));
        assert!(!map.has(Field::Status));
        assert!(!map.has(Field::Id));
    }

    #[test]
    fn test_cell_access() {
        let map = ColumnMap::resolve(&headers(&["TestCaseNo", "TestResult"]));
        let row = vec!["TC001".to_string(), " Pass ".to_string()];
        assert_eq!(map.cell(&row, Field::Id), "TC001");
        assert_eq!(map.cell(&row, Field::Status), "Pass");
        assert_eq!(map.cell(&row, Field::Error), "");
        // Short row
        let short = vec!["TC002".to_string()];
        assert_eq!(map.cell(&short, Field::Status), "");
    }
}
