use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Overall result of one feature workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    NotRun,
    Passed,
    Failed,
}

impl FeatureStatus {
    /// Uppercase label used in report tables
    pub fn label(&self) -> &'static str {
        match self {
            FeatureStatus::NotRun => "NOT RUN",
            FeatureStatus::Passed => "PASSED",
            FeatureStatus::Failed => "FAILED",
        }
    }
}

/// Summary of one feature workbook, recomputed fresh on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub feature_name: String,
    /// Workbook path relative to the results root, forward slashes
    pub workbook_path: String,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub pass_rate: f64,
    pub status: FeatureStatus,
    pub run_timestamp: String,
    /// Test-case folder name -> evidence paths relative to the results root.
    /// Sorted map so prefix matching against case ids is deterministic.
    pub test_evidence: BTreeMap<String, Vec<String>>,
}

/// One execution session: every feature workbook found under a run folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub timestamp: String,
    pub features: Vec<FeatureSummary>,
}

/// Logical fields of a test-case row, resolved through the column schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCaseFields {
    pub id: String,
    pub description: String,
    pub status: String,
    pub error: String,
    pub expected: String,
}
