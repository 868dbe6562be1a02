//! End-to-end flow over a synthetic results tree: author real workbooks,
//! scan and aggregate them, then render reports and exports.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

use ldp_dashboard::aggregator::{self, ExportOptions};
use ldp_dashboard::report::{FontConfig, Renderer};
use ldp_dashboard::thumbnails::{backend::PlaceholderBackend, ThumbnailCache};
use ldp_dashboard::workbook;
use ldp_dashboard::workbook::types::FeatureStatus;

/// One row of the test-case sheet: (id, description, execute, result, fail description)
type Row<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str);

fn write_workbook(path: &Path, rows: &[Row]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let headers = [
        "TestCaseNo",
        "TestCaseDescription",
        "Execute",
        "TestResult",
        "Fail_Description",
    ];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    for (i, (id, desc, execute, result, error)) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, *id).unwrap();
        sheet.write_string(row, 1, *desc).unwrap();
        sheet.write_string(row, 2, *execute).unwrap();
        sheet.write_string(row, 3, *result).unwrap();
        sheet.write_string(row, 4, *error).unwrap();
    }
    workbook.save(path).unwrap();
}

fn write_png(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbImage::from_pixel(8, 8, image::Rgb([200, 120, 40]))
        .save(path)
        .unwrap();
}

/// results/20250620-111221/Transfer with 3 executed rows (2 pass, 1 fail),
/// one skipped row, and evidence under TC001/
fn seed_results() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    let feature_dir = root.join("20250620-111221").join("Transfer");

    write_workbook(
        &feature_dir.join("Transfer.xlsx"),
        &[
            ("TC001", "Transfer to own account", "Y", "Pass", ""),
            ("TC002", "Transfer to other bank", "Y", "Pass", ""),
            ("TC003", "Transfer above limit", "Y", "Fail", "Limit error not shown"),
            ("TC004", "Scheduled transfer", "N", "", ""),
        ],
    );
    write_png(&feature_dir.join("TC001").join("step1_PDF.png"));
    std::fs::create_dir_all(feature_dir.join("TC003")).unwrap();
    std::fs::write(
        feature_dir.join("TC003").join("capture.html"),
        "<html><body><h1>failure page</h1></body></html>",
    )
    .unwrap();

    // A folder that must be ignored entirely
    let stray = root.join("archive").join("Transfer");
    write_workbook(
        &stray.join("Transfer.xlsx"),
        &[("TC001", "Old", "Y", "Pass", "")],
    );

    (dir, root)
}

#[test]
fn aggregates_one_run_with_expected_counts() {
    let (_dir, root) = seed_results();
    let data = aggregator::dashboard_data(&root);

    assert_eq!(data.total_runs, 1);
    let run = &data.runs[0];
    assert_eq!(run.timestamp, "20250620-111221");
    assert_eq!(run.features.len(), 1);

    let feature = &run.features[0];
    assert_eq!(feature.feature_name, "Transfer");
    assert_eq!(feature.total, 3);
    assert_eq!(feature.passed, 2);
    assert_eq!(feature.failed, 1);
    assert_eq!(feature.pass_rate, 66.67);
    assert_eq!(feature.status, FeatureStatus::Failed);
    assert!(feature.test_evidence.contains_key("TC001"));
    assert!(feature.test_evidence.contains_key("TC003"));
}

#[test]
fn parsing_is_idempotent() {
    let (_dir, root) = seed_results();
    let workbook_path = root.join("20250620-111221/Transfer/Transfer.xlsx");
    let first = workbook::parse_feature_summary(&workbook_path, &root).unwrap();
    let second = workbook::parse_feature_summary(&workbook_path, &root).unwrap();
    assert_eq!(first, second);
}

#[test]
fn preview_returns_headers_and_rows() {
    let (_dir, root) = seed_results();
    let preview = workbook::preview(&root.join("20250620-111221/Transfer/Transfer.xlsx")).unwrap();
    assert_eq!(preview.headers[0], "TestCaseNo");
    assert_eq!(preview.total_rows, 4);
    assert_eq!(preview.rows[2][3], "Fail");
}

#[tokio::test]
async fn renders_full_report_with_evidence() {
    let (_dir, root) = seed_results();
    let runs = aggregator::collect_runs(&root);
    assert_eq!(runs.len(), 1);

    let fonts = FontConfig::latin_fallback();
    // Placeholder backend only: no browser in the test environment
    let cache = ThumbnailCache::new(vec![Box::new(PlaceholderBackend)]);
    let renderer = Renderer {
        results_root: &root,
        fonts: &fonts,
        thumbnails: &cache,
    };

    let options = ExportOptions::default();
    let bytes = renderer.dashboard_report(&runs, &options).await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    // The evidence section must have populated the HTML thumbnail cache
    assert!(root
        .join("20250620-111221/Transfer/TC003/.thumbnails")
        .is_dir());
}

#[tokio::test]
async fn single_test_case_pdf_and_feature_zip() {
    let (_dir, root) = seed_results();
    let runs = aggregator::collect_runs(&root);
    let feature = &runs[0].features[0];

    let fonts = FontConfig::latin_fallback();
    let cache = ThumbnailCache::new(vec![Box::new(PlaceholderBackend)]);
    let renderer = Renderer {
        results_root: &root,
        fonts: &fonts,
        thumbnails: &cache,
    };

    let pdf = renderer
        .test_case_pdf(feature, &runs[0].timestamp, "TC003")
        .await
        .unwrap();
    assert!(pdf.starts_with(b"%PDF"));

    let missing = renderer
        .test_case_pdf(feature, &runs[0].timestamp, "TC999")
        .await;
    assert!(missing.is_err());

    let zip = renderer
        .feature_zip(feature, &runs[0].timestamp)
        .await
        .unwrap();
    // Local file header signature; three executed PASS/FAIL cases inside
    assert_eq!(&zip[0..4], b"PK\x03\x04");
}

#[test]
fn export_scopes_over_multiple_runs() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    for ts in ["20250101-090000", "20250201-090000"] {
        write_workbook(
            &root.join(ts).join("Login").join("Login.xlsx"),
            &[("TC001", "Login", "Y", "Pass", "")],
        );
    }

    let runs = aggregator::collect_runs(&root);
    assert_eq!(runs.len(), 2);

    let latest = aggregator::filter_runs(
        runs.clone(),
        &ExportOptions {
            scope: "latest".into(),
            ..Default::default()
        },
    );
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].timestamp, "20250201-090000");

    let january = aggregator::filter_runs(
        runs,
        &ExportOptions {
            scope: "date_range".into(),
            start_date: Some("20250101-000000".into()),
            end_date: Some("20250131-235959".into()),
            ..Default::default()
        },
    );
    assert_eq!(january.len(), 1);
    assert_eq!(january[0].timestamp, "20250101-090000");
}

#[test]
fn workbook_without_status_column_degrades() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    let path = root.join("20250301-080000/Payments/Payments.xlsx");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let mut wb = Workbook::new();
    let sheet = wb.add_worksheet();
    sheet.write_string(0, 0, "SomeColumn").unwrap();
    sheet.write_string(1, 0, "value").unwrap();
    wb.save(&path).unwrap();

    let summary = workbook::parse_feature_summary(&path, &root).unwrap();
    assert_eq!(summary.status, FeatureStatus::NotRun);
    assert_eq!(summary.total, 0);
    // And the aggregator drops it from the dashboard
    assert!(aggregator::collect_runs(&root).is_empty());
}
