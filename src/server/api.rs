//! REST API endpoints for the dashboard
//!
//! Aggregated data, workbook previews, PDF/ZIP exports and thumbnail
//! cache maintenance. Failures come back as JSON `{"error": ...}` bodies;
//! nothing here can take the process down.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::aggregator::{self, ExportOptions};
use crate::report::{self, FontConfig, Renderer};
use crate::thumbnails::{self, backend::ChromiumBackend, Thumbnail, ThumbnailCache};
use crate::workbook;
use crate::workbook::types::Run;

/// Shared state for API handlers
pub struct AppState {
    pub results_root: PathBuf,
    pub fonts: FontConfig,
    pub thumbnails: ThumbnailCache,
}

impl AppState {
    fn renderer(&self) -> Renderer<'_> {
        Renderer {
            results_root: &self.results_root,
            fonts: &self.fonts,
            thumbnails: &self.thumbnails,
        }
    }
}

/// Build API router
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/data", get(get_data))
        .route("/api/excel_preview", get(excel_preview))
        .route("/api/export_pdf", post(export_pdf))
        .route("/api/export_testcase_pdf", post(export_testcase_pdf))
        .route("/api/export_feature_pdfs_zip", post(export_feature_pdfs_zip))
        .route(
            "/api/export_latest_all_features_zip",
            post(export_latest_all_features_zip),
        )
        .route("/api/evidence_thumbnail", get(evidence_thumbnail))
        .route("/api/html_thumbnail", get(evidence_thumbnail))
        .route("/api/thumbnail_info", get(thumbnail_info))
        .route("/api/thumbnail_status", get(thumbnail_status))
        .route("/api/clear_thumbnails", post(clear_thumbnails))
        .route("/api/cleanup_old_thumbnails", post(cleanup_old_thumbnails))
        .route("/api/force_cleanup_thumbnails", post(force_cleanup_thumbnails))
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Resolve a client-supplied relative path under the results root,
/// rejecting traversal components.
fn resolve_under_root(root: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    if rel.is_absolute() {
        return None;
    }
    if rel
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return None;
    }
    Some(root.join(rel))
}

fn attachment(bytes: Vec<u8>, content_type: &'static str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// GET /api/data - Aggregated run/feature summary
async fn get_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(aggregator::dashboard_data(&state.results_root))
}

#[derive(Deserialize)]
pub struct PathQuery {
    pub path: String,
}

/// GET /api/excel_preview?path=... - First rows of a workbook
async fn excel_preview(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PathQuery>,
) -> Response {
    let Some(full_path) = resolve_under_root(&state.results_root, &params.path) else {
        return error_json(StatusCode::BAD_REQUEST, "Invalid path");
    };
    if !full_path.exists() {
        return error_json(
            StatusCode::NOT_FOUND,
            format!("File not found: {}", params.path),
        );
    }
    match workbook::preview(&full_path) {
        Ok(preview) => Json(preview).into_response(),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// POST /api/export_pdf - Full or filtered dashboard report
async fn export_pdf(
    State(state): State<Arc<AppState>>,
    Json(options): Json<ExportOptions>,
) -> Response {
    let runs = aggregator::collect_runs(&state.results_root);
    let runs = aggregator::filter_runs(runs, &options);

    let totals = report::render::Totals::over(&runs);
    match state.renderer().dashboard_report(&runs, &options).await {
        Ok(bytes) => attachment(
            bytes,
            "application/pdf",
            &report::report_filename(totals.failed),
        ),
        Err(e) => {
            log::error!("PDF export failed: {}", e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[derive(Deserialize)]
pub struct TestCaseExportRequest {
    pub test_case_id: String,
    pub feature_name: String,
    pub run_timestamp: String,
}

fn find_feature<'a>(
    runs: &'a [Run],
    feature_name: &str,
    run_timestamp: &str,
) -> Option<&'a crate::workbook::types::FeatureSummary> {
    runs.iter()
        .filter(|r| run_timestamp.is_empty() || r.timestamp == run_timestamp)
        .flat_map(|r| r.features.iter())
        .find(|f| f.feature_name == feature_name)
}

/// POST /api/export_testcase_pdf - One test case as PDF
async fn export_testcase_pdf(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TestCaseExportRequest>,
) -> Response {
    let runs = aggregator::collect_runs(&state.results_root);
    let Some(feature) = find_feature(&runs, &request.feature_name, &request.run_timestamp) else {
        return error_json(
            StatusCode::NOT_FOUND,
            format!("Feature not found: {}", request.feature_name),
        );
    };
    match state
        .renderer()
        .test_case_pdf(feature, &feature.run_timestamp, &request.test_case_id)
        .await
    {
        Ok(bytes) => {
            let filename = format!(
                "TestCase_{}_{}.pdf",
                request.feature_name, request.test_case_id
            );
            attachment(bytes, "application/pdf", &filename)
        }
        Err(e) => {
            log::error!("Test case export failed: {}", e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[derive(Deserialize)]
pub struct FeatureExportRequest {
    pub feature_name: String,
    #[serde(default)]
    pub run_timestamp: String,
}

/// POST /api/export_feature_pdfs_zip - Every case of one feature, zipped
async fn export_feature_pdfs_zip(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeatureExportRequest>,
) -> Response {
    let runs = aggregator::collect_runs(&state.results_root);
    let Some(feature) = find_feature(&runs, &request.feature_name, &request.run_timestamp) else {
        return error_json(
            StatusCode::NOT_FOUND,
            format!("Feature not found: {}", request.feature_name),
        );
    };
    match state
        .renderer()
        .feature_zip(feature, &feature.run_timestamp)
        .await
    {
        Ok(bytes) => {
            let filename = format!("{}_test_cases.zip", request.feature_name);
            attachment(bytes, "application/zip", &filename)
        }
        Err(e) => {
            log::error!("Feature zip export failed: {}", e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[derive(Deserialize)]
pub struct RunExportRequest {
    #[serde(default)]
    pub run_timestamp: String,
    #[serde(default)]
    pub features: Vec<String>,
}

/// POST /api/export_latest_all_features_zip - All given features of one
/// run (the latest when no timestamp is supplied), zipped per feature
async fn export_latest_all_features_zip(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunExportRequest>,
) -> Response {
    let runs = aggregator::collect_runs(&state.results_root);
    let run = if request.run_timestamp.is_empty() {
        runs.first()
    } else {
        runs.iter().find(|r| r.timestamp == request.run_timestamp)
    };
    let Some(run) = run else {
        return error_json(StatusCode::NOT_FOUND, "No matching run found");
    };
    match state.renderer().run_zip(run, &request.features).await {
        Ok(bytes) => {
            let filename = format!("TestCases_{}.zip", run.timestamp);
            attachment(bytes, "application/zip", &filename)
        }
        Err(e) => {
            log::error!("Run zip export failed: {}", e);
            error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/evidence_thumbnail?path=... - Preview image for an evidence
/// file. HTML goes through the thumbnail cache; images are served as-is.
async fn evidence_thumbnail(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PathQuery>,
) -> Response {
    let Some(full_path) = resolve_under_root(&state.results_root, &params.path) else {
        return error_json(StatusCode::BAD_REQUEST, "Invalid path");
    };
    if !full_path.is_file() {
        return error_json(
            StatusCode::NOT_FOUND,
            format!("File not found: {}", params.path),
        );
    }

    if workbook::evidence::is_html(&full_path) {
        match state.thumbnails.get_thumbnail(&full_path).await {
            Ok(Thumbnail::File(thumb)) => match std::fs::read(&thumb) {
                Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
                Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            },
            Ok(Thumbnail::InlineSvg(svg)) => {
                ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()
            }
            Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    } else if workbook::evidence::is_image(&full_path) {
        let content_type = match full_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("bmp") => "image/bmp",
            _ => "image/jpeg",
        };
        match std::fs::read(&full_path) {
            Ok(bytes) => ([(header::CONTENT_TYPE, content_type)], bytes).into_response(),
            Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    } else {
        error_json(StatusCode::BAD_REQUEST, "Not a previewable evidence file")
    }
}

#[derive(Serialize)]
struct ThumbnailStatus {
    backends: Vec<&'static str>,
    chrome_available: bool,
}

/// GET /api/thumbnail_status - Which render backends are usable
async fn thumbnail_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ThumbnailStatus {
        backends: state.thumbnails.backend_names(),
        chrome_available: ChromiumBackend::is_available(),
    })
}

/// GET /api/thumbnail_info - Cache folder/file/byte counts
async fn thumbnail_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(thumbnails::cache_info(&state.results_root))
}

/// POST /api/clear_thumbnails - Remove every .thumbnails folder
async fn clear_thumbnails(State(state): State<Arc<AppState>>) -> Response {
    match thumbnails::clear_cache(&state.results_root, false) {
        Ok(removed) => Json(serde_json::json!({ "removed_folders": removed })).into_response(),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// POST /api/cleanup_old_thumbnails - Drop only stale cache entries
async fn cleanup_old_thumbnails(State(state): State<Arc<AppState>>) -> Response {
    match thumbnails::cleanup_stale(&state.results_root) {
        Ok(removed) => Json(serde_json::json!({ "removed_files": removed })).into_response(),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// POST /api/force_cleanup_thumbnails - Clear, skipping undeletable folders
async fn force_cleanup_thumbnails(State(state): State<Arc<AppState>>) -> Response {
    match thumbnails::clear_cache(&state.results_root, true) {
        Ok(removed) => Json(serde_json::json!({ "removed_folders": removed })).into_response(),
        Err(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_under_root_rejects_traversal() {
        let root = Path::new("/srv/results");
        assert!(resolve_under_root(root, "../etc/passwd").is_none());
        assert!(resolve_under_root(root, "run/../../etc").is_none());
        assert!(resolve_under_root(root, "/etc/passwd").is_none());
        assert_eq!(
            resolve_under_root(root, "20250620-111221/Transfer/a.png"),
            Some(PathBuf::from("/srv/results/20250620-111221/Transfer/a.png"))
        );
    }
}
