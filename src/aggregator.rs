//! Run aggregation
//!
//! Drives the scanner and workbook parser over a results root, groups
//! feature summaries into runs and applies export scope filters. Runs are
//! sorted by timestamp descending; plain string ordering is correct
//! because the timestamp format is fixed-width and zero-padded.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::scanner;
use crate::workbook;
use crate::workbook::types::Run;

/// Payload of `GET /api/data`
#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub runs: Vec<Run>,
    pub total_runs: usize,
}

/// Parse every workbook under the results root into runs.
///
/// Features that executed nothing (`total == 0`) are dropped, and a
/// `(timestamp, feature)` pair seen twice keeps only the first workbook.
pub fn collect_runs(results_root: &Path) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for workbook_path in scanner::find_workbooks(results_root) {
        let Some(feature) = workbook::parse_feature_summary(&workbook_path, results_root) else {
            continue;
        };
        if feature.total == 0 {
            continue;
        }
        let key = (feature.run_timestamp.clone(), feature.feature_name.clone());
        if !seen.insert(key) {
            log::debug!(
                "Duplicate feature {} in run {}, keeping first",
                feature.feature_name,
                feature.run_timestamp
            );
            continue;
        }
        match runs.iter_mut().find(|r| r.timestamp == feature.run_timestamp) {
            Some(run) => run.features.push(feature),
            None => runs.push(Run {
                timestamp: feature.run_timestamp.clone(),
                features: vec![feature],
            }),
        }
    }

    runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    runs
}

pub fn dashboard_data(results_root: &Path) -> DashboardData {
    let runs = collect_runs(results_root);
    let total_runs = runs.len();
    DashboardData { runs, total_runs }
}

/// Options of `POST /api/export_pdf`
#[derive(Debug, Clone, Deserialize)]
pub struct ExportOptions {
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_true")]
    pub include_summary: bool,
    #[serde(default = "default_true")]
    pub include_screenshots: bool,
    #[serde(default = "default_true")]
    pub include_details: bool,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

fn default_scope() -> String {
    "latest".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            include_summary: true,
            include_screenshots: true,
            include_details: true,
            start_date: None,
            end_date: None,
            features: Vec::new(),
        }
    }
}

/// Apply the export scope to a sorted run list.
pub fn filter_runs(runs: Vec<Run>, options: &ExportOptions) -> Vec<Run> {
    match options.scope.as_str() {
        "latest" => runs.into_iter().take(1).collect(),
        "features" => runs
            .into_iter()
            .filter_map(|run| {
                let features: Vec<_> = run
                    .features
                    .into_iter()
                    .filter(|f| options.features.contains(&f.feature_name))
                    .collect();
                if features.is_empty() {
                    None
                } else {
                    Some(Run {
                        timestamp: run.timestamp,
                        features,
                    })
                }
            })
            .collect(),
        "date_range" => runs
            .into_iter()
            .filter(|run| {
                let after_start = options
                    .start_date
                    .as_deref()
                    .map_or(true, |s| run.timestamp.as_str() >= s);
                let before_end = options
                    .end_date
                    .as_deref()
                    .map_or(true, |e| run.timestamp.as_str() <= e);
                after_start && before_end
            })
            .collect(),
        _ => runs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::types::{FeatureStatus, FeatureSummary};

    fn feature(name: &str, ts: &str) -> FeatureSummary {
        FeatureSummary {
            feature_name: name.to_string(),
            workbook_path: format!("{}/{}/{}.xlsx", ts, name, name),
            total: 3,
            passed: 2,
            failed: 1,
            pass_rate: 66.67,
            status: FeatureStatus::Failed,
            run_timestamp: ts.to_string(),
            test_evidence: Default::default(),
        }
    }

    fn runs() -> Vec<Run> {
        vec![
            Run {
                timestamp: "20250301-120000".into(),
                features: vec![feature("Transfer", "20250301-120000")],
            },
            Run {
                timestamp: "20250201-120000".into(),
                features: vec![
                    feature("Transfer", "20250201-120000"),
                    feature("Login", "20250201-120000"),
                ],
            },
            Run {
                timestamp: "20250101-120000".into(),
                features: vec![feature("Login", "20250101-120000")],
            },
        ]
    }

    #[test]
    fn test_scope_latest() {
        let opts = ExportOptions {
            scope: "latest".into(),
            ..Default::default()
        };
        let filtered = filter_runs(runs(), &opts);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].timestamp, "20250301-120000");
    }

    #[test]
    fn test_scope_features() {
        let opts = ExportOptions {
            scope: "features".into(),
            features: vec!["Login".into()],
            ..Default::default()
        };
        let filtered = filter_runs(runs(), &opts);
        assert_eq!(filtered.len(), 2);
        assert!(filtered
            .iter()
            .all(|r| r.features.iter().all(|f| f.feature_name == "Login")));
    }

    #[test]
    fn test_scope_date_range_inclusive() {
        let opts = ExportOptions {
            scope: "date_range".into(),
            start_date: Some("20250101-000000".into()),
            end_date: Some("20250131-235959".into()),
            ..Default::default()
        };
        let filtered = filter_runs(runs(), &opts);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].timestamp, "20250101-120000");
    }

    #[test]
    fn test_scope_date_range_open_ends() {
        let opts = ExportOptions {
            scope: "date_range".into(),
            start_date: Some("20250201-000000".into()),
            end_date: None,
            ..Default::default()
        };
        let filtered = filter_runs(runs(), &opts);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_scope_all() {
        let opts = ExportOptions {
            scope: "all".into(),
            ..Default::default()
        };
        assert_eq!(filter_runs(runs(), &opts).len(), 3);
    }

    #[test]
    fn test_collect_runs_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_runs(dir.path()).is_empty());
    }
}
