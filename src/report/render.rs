//! Report rendering
//!
//! Builds the dashboard PDF (summary, feature table, failed cases,
//! evidence pages) and the per-test-case documents the bulk ZIP exports
//! are made of. HTML evidence is resolved through the thumbnail cache
//! before the document is assembled, so the build itself is synchronous.
//! One failing test case, image or HTML conversion never aborts a
//! document; the failing element becomes a visible placeholder row.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::aggregator::ExportOptions;
use crate::thumbnails::{Thumbnail, ThumbnailCache};
use crate::workbook::columns::{ColumnMap, Field};
use crate::workbook::sheet::Sheet;
use crate::workbook::types::{FeatureStatus, FeatureSummary, Run, TestCaseFields};
use crate::workbook::{self, evidence};

use super::chart;
use super::fonts::FontConfig;
use super::layout::{fitted_size, Align, Cell, DocBuilder, TableTheme, CONTENT_W, MARGIN};
use super::style::{self, TextStyle};

/// Hard ceiling on generated documents; one reduced retry before failing
pub const MAX_PDF_BYTES: usize = 25 * 1024 * 1024;

/// Evidence files embedded per test case
pub const MAX_EVIDENCE_PER_CASE: usize = 20;

/// Evidence path (relative) -> rendered thumbnail on disk
type ThumbMap = HashMap<String, PathBuf>;

/// Knobs lowered on the size-reduction retry
#[derive(Debug, Clone, Copy)]
pub struct RenderLimits {
    pub evidence_per_case: usize,
    pub image_w_mm: f32,
    pub image_h_mm: f32,
    pub error_text_chars: usize,
}

impl RenderLimits {
    pub fn standard() -> Self {
        Self {
            evidence_per_case: MAX_EVIDENCE_PER_CASE,
            image_w_mm: 82.0,
            image_h_mm: 70.0,
            error_text_chars: 600,
        }
    }

    pub fn reduced() -> Self {
        Self {
            evidence_per_case: 5,
            image_w_mm: 55.0,
            image_h_mm: 45.0,
            error_text_chars: 200,
        }
    }
}

/// Renderer configuration shared by every export route
pub struct Renderer<'a> {
    pub results_root: &'a Path,
    pub fonts: &'a FontConfig,
    pub thumbnails: &'a ThumbnailCache,
}

impl<'a> Renderer<'a> {
    /// Full dashboard report over the filtered runs. Retries once with
    /// reduced content when the output exceeds the size ceiling.
    pub async fn dashboard_report(&self, runs: &[Run], options: &ExportOptions) -> Result<Vec<u8>> {
        let thumbs = if options.include_screenshots {
            self.resolve_run_thumbnails(runs).await
        } else {
            ThumbMap::new()
        };

        let bytes = self.dashboard_once(runs, options, RenderLimits::standard(), &thumbs)?;
        if bytes.len() <= MAX_PDF_BYTES {
            return Ok(bytes);
        }
        log::warn!(
            "Report is {} bytes, retrying with reduced content",
            bytes.len()
        );
        let bytes = self.dashboard_once(runs, options, RenderLimits::reduced(), &thumbs)?;
        anyhow::ensure!(
            bytes.len() <= MAX_PDF_BYTES,
            "generated PDF exceeds the {} MB limit even after reduction",
            MAX_PDF_BYTES / (1024 * 1024)
        );
        Ok(bytes)
    }

    /// Pre-render thumbnails for every HTML evidence file in the export
    /// set. Failures are logged; the affected file degrades to a
    /// placeholder row later.
    async fn resolve_run_thumbnails(&self, runs: &[Run]) -> ThumbMap {
        let mut map = ThumbMap::new();
        for run in runs {
            for feature in &run.features {
                for files in feature.test_evidence.values() {
                    let displayable = files
                        .iter()
                        .filter(|f| {
                            let p = Path::new(f.as_str());
                            evidence::is_image(p) || evidence::is_html(p)
                        })
                        .take(MAX_EVIDENCE_PER_CASE);
                    for rel in displayable {
                        self.resolve_one_thumbnail(rel, &mut map).await;
                    }
                }
            }
        }
        map
    }

    async fn resolve_one_thumbnail(&self, rel: &str, map: &mut ThumbMap) {
        let abs = self.results_root.join(rel);
        if !evidence::is_html(&abs) || map.contains_key(rel) {
            return;
        }
        match self.thumbnails.get_thumbnail(&abs).await {
            Ok(Thumbnail::File(path)) => {
                map.insert(rel.to_string(), path);
            }
            Ok(Thumbnail::InlineSvg(_)) => {
                log::warn!("No raster thumbnail backend for {}", rel);
            }
            Err(e) => {
                log::warn!("Thumbnail failed for {}: {}", rel, e);
            }
        }
    }

    fn dashboard_once(
        &self,
        runs: &[Run],
        options: &ExportOptions,
        limits: RenderLimits,
        thumbs: &ThumbMap,
    ) -> Result<Vec<u8>> {
        let mut b = DocBuilder::new("Test Automation Report", self.fonts)?;

        self.title_block(&mut b);
        b.spacer(8.0);
        self.metadata_table(&mut b, runs, options);
        b.spacer(8.0);

        let totals = Totals::over(runs);
        if options.include_summary {
            b.boxed_heading("EXECUTIVE SUMMARY", &style::HEADING, style::CREAM, style::GOLD);
            b.spacer(5.0);
            self.summary_table(&mut b, &totals);
            b.spacer(8.0);
            chart::pie_chart(&mut b, totals.passed, totals.failed);
        }

        b.page_break();
        b.boxed_heading("FEATURE TEST RESULTS", &style::HEADING, style::CREAM, style::GOLD);
        b.spacer(5.0);
        self.feature_table(&mut b, runs);
        b.spacer(8.0);

        if options.include_details {
            let failed_cases = self.collect_failed_cases(runs);
            if !failed_cases.is_empty() {
                b.boxed_heading(
                    "FAILED TEST CASES DETAILS",
                    &style::HEADING,
                    style::CREAM,
                    style::GOLD,
                );
                b.spacer(5.0);
                self.failed_table(&mut b, &failed_cases, limits);
                b.spacer(8.0);
            }
        }

        if options.include_screenshots {
            b.page_break();
            b.boxed_heading(
                "TEST EVIDENCE SCREENSHOTS",
                &style::HEADING,
                style::CREAM,
                style::GOLD,
            );
            b.spacer(5.0);
            for run in runs {
                for feature in &run.features {
                    self.feature_evidence(&mut b, feature, limits, thumbs);
                    b.page_break();
                }
            }
        }

        self.footer(&mut b);
        b.finish()
    }

    fn title_block(&self, b: &mut DocBuilder) {
        b.filled_rect(MARGIN, b.cursor(), CONTENT_W, 1.2, Some(style::GOLD_DARK), None);
        b.advance(1.2);
        b.spacer(6.0);
        b.paragraph_aligned("TEST AUTOMATION REPORT", &style::TITLE, Align::Center);
        b.spacer(2.0);
        b.paragraph_aligned("LDP Automation Project", &style::SUBHEADING, Align::Center);
        b.spacer(6.0);
        b.filled_rect(MARGIN, b.cursor(), CONTENT_W, 1.2, Some(style::GOLD), None);
        b.advance(1.2);
    }

    fn metadata_table(&self, b: &mut DocBuilder, runs: &[Run], options: &ExportOptions) {
        let period = match options.scope.as_str() {
            "latest" => "Latest Run".to_string(),
            "date_range" => format!(
                "{} to {}",
                options.start_date.as_deref().unwrap_or("Start"),
                options.end_date.as_deref().unwrap_or("End")
            ),
            "features" => format!("Selected Features ({})", options.features.len()),
            _ => "All Runs".to_string(),
        };
        let total_features: usize = runs.iter().map(|r| r.features.len()).sum();
        let execution_time = runs
            .first()
            .map(|r| r.timestamp.clone())
            .unwrap_or_else(|| "N/A".to_string());
        let pairs = vec![
            (
                "Generated:".to_string(),
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            ("Report Period:".to_string(), period),
            ("Total Features:".to_string(), total_features.to_string()),
            ("Execution Time:".to_string(), execution_time),
        ];
        b.key_value_table(&pairs);
    }

    fn summary_table(&self, b: &mut DocBuilder, totals: &Totals) {
        let widths = [43.5, 43.5, 43.5, 43.5];
        let header: Vec<Cell> = ["Total Tests", "Passed", "Failed", "Pass Rate"]
            .iter()
            .map(|t| Cell::new(*t, style::TABLE_HEADER, Align::Center))
            .collect();
        let value =
            |v: String, color: u32| Cell::new(v, TextStyle::new(14.0, true, color), Align::Center);
        let rows = vec![vec![
            value(totals.total.to_string(), style::INK),
            value(totals.passed.to_string(), style::GREEN),
            value(totals.failed.to_string(), style::RED),
            value(format!("{:.2}%", totals.pass_rate()), style::GOLDENROD),
        ]];
        b.table(&widths, &header, &rows, &TableTheme::default());
    }

    fn feature_table(&self, b: &mut DocBuilder, runs: &[Run]) {
        let features = unique_features(runs);
        if features.is_empty() {
            b.paragraph("No feature test results available.", &style::NORMAL);
            return;
        }
        let widths = [52.0, 26.0, 26.0, 22.0, 22.0, 26.0];
        let header: Vec<Cell> =
            ["Feature", "Status", "Total Executed", "Passed", "Failed", "Pass Rate"]
                .iter()
                .map(|t| Cell::new(*t, style::TABLE_HEADER, Align::Center))
                .collect();
        let rows: Vec<Vec<Cell>> = features
            .iter()
            .map(|f| {
                let status_color = match f.status {
                    FeatureStatus::Passed => style::GREEN,
                    FeatureStatus::Failed => style::RED,
                    FeatureStatus::NotRun => style::GRAY,
                };
                vec![
                    Cell::new(f.feature_name.clone(), style::CELL_BOLD, Align::Left),
                    Cell::new(
                        f.status.label(),
                        TextStyle::new(9.0, true, status_color),
                        Align::Center,
                    ),
                    Cell::new(f.total.to_string(), style::CELL, Align::Center),
                    Cell::new(
                        f.passed.to_string(),
                        TextStyle::new(9.0, false, style::GREEN),
                        Align::Center,
                    ),
                    Cell::new(
                        f.failed.to_string(),
                        TextStyle::new(9.0, false, style::RED),
                        Align::Center,
                    ),
                    Cell::new(
                        format!("{:.2}%", f.pass_rate),
                        TextStyle::new(9.0, false, style::GOLDENROD),
                        Align::Center,
                    ),
                ]
            })
            .collect();
        b.table(&widths, &header, &rows, &TableTheme::default());
    }

    /// Failed executed rows across the export set, one workbook at a time.
    /// Unreadable workbooks are logged and skipped.
    fn collect_failed_cases(&self, runs: &[Run]) -> Vec<(String, TestCaseFields)> {
        let mut cases = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for run in runs {
            for feature in &run.features {
                if feature.failed == 0 {
                    continue;
                }
                let key = (feature.feature_name.clone(), run.timestamp.clone());
                if !seen.insert(key) {
                    continue;
                }
                match self.load_feature_sheet(feature) {
                    Some((sheet, cols)) => {
                        for fields in workbook::failed_cases(&sheet, &cols) {
                            cases.push((feature.feature_name.clone(), fields));
                        }
                    }
                    None => {
                        log::warn!("Could not load failed cases for {}", feature.feature_name);
                    }
                }
            }
        }
        cases
    }

    fn failed_table(
        &self,
        b: &mut DocBuilder,
        cases: &[(String, TestCaseFields)],
        limits: RenderLimits,
    ) {
        let widths = [40.0, 70.0, 64.0];
        let header: Vec<Cell> = ["Feature", "Test Case", "Fail Description"]
            .iter()
            .map(|t| Cell::new(*t, style::TABLE_HEADER, Align::Center))
            .collect();
        let rows: Vec<Vec<Cell>> = cases
            .iter()
            .map(|(feature, fields)| {
                let name = if fields.description.is_empty() {
                    fields.id.clone()
                } else {
                    fields.description.clone()
                };
                let error = if fields.error.is_empty() {
                    "No error message".to_string()
                } else {
                    truncate_chars(&fields.error, limits.error_text_chars)
                };
                vec![
                    Cell::new(feature.clone(), style::CELL_BOLD, Align::Left),
                    Cell::new(name, style::CELL, Align::Left),
                    Cell::new(
                        error,
                        TextStyle::new(9.0, false, style::RED_DARK),
                        Align::Left,
                    ),
                ]
            })
            .collect();
        b.table(&widths, &header, &rows, &TableTheme::default());
    }

    fn load_feature_sheet(&self, feature: &FeatureSummary) -> Option<(Sheet, ColumnMap)> {
        let path = self.results_root.join(&feature.workbook_path);
        match Sheet::load(&path) {
            Ok(sheet) => {
                let cols = ColumnMap::resolve(&sheet.headers);
                Some((sheet, cols))
            }
            Err(e) => {
                log::warn!("Cannot reopen {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Evidence pages for one feature: a header per executed PASS/FAIL
    /// test case with description, failure text and its evidence grid.
    fn feature_evidence(
        &self,
        b: &mut DocBuilder,
        feature: &FeatureSummary,
        limits: RenderLimits,
        thumbs: &ThumbMap,
    ) {
        b.boxed_heading(
            &format!("Feature: {}", feature.feature_name),
            &style::FEATURE,
            style::LEMON,
            style::GOLD,
        );
        b.spacer(4.0);

        let Some((sheet, cols)) = self.load_feature_sheet(feature) else {
            b.paragraph("No test case data available from Excel file.", &style::NORMAL);
            return;
        };
        if !cols.has(Field::Id) || !cols.has(Field::Status) {
            b.paragraph("No test case data available from Excel file.", &style::NORMAL);
            return;
        }

        let executed: Vec<Vec<String>> = workbook::executed_rows(&sheet, &cols)
            .into_iter()
            .cloned()
            .collect();
        for row in &executed {
            let fields = workbook::extract_fields(&cols, row);
            if fields.id.is_empty() {
                continue;
            }
            let is_pass = fields.status.eq_ignore_ascii_case("pass");
            let is_fail = fields.status.eq_ignore_ascii_case("fail");
            if !is_pass && !is_fail {
                continue;
            }

            let matched = evidence::best_match(&feature.test_evidence, &fields.id);
            let folder = matched.map(|(name, _)| name).unwrap_or(fields.id.as_str());
            self.test_case_header(b, folder, is_pass);
            b.spacer(2.0);

            let description = workbook::find_case_description(&sheet, &cols, &fields.id)
                .unwrap_or_else(|| "No description available".to_string());
            b.paragraph(&format!("Description: {}", description), &style::NORMAL);
            b.spacer(3.0);

            if is_fail {
                self.failure_block(b, &fields.error, limits);
            }

            match matched {
                Some((_, files)) if !files.is_empty() => {
                    self.evidence_grid(b, files, limits, thumbs);
                }
                _ => {
                    b.paragraph("Screenshots: No screenshot found", &style::CAPTION);
                }
            }
            b.spacer(7.0);
        }
    }

    fn test_case_header(&self, b: &mut DocBuilder, folder: &str, is_pass: bool) {
        let height = style::TEST_CASE.line_height_mm() + 4.0;
        b.ensure_space(height + 2.0);
        b.filled_rect(
            MARGIN,
            b.cursor(),
            CONTENT_W,
            height,
            Some(style::CREAM_LIGHT),
            Some((style::GOLD, 1.0)),
        );
        let label = format!("Test Case: {}", folder);
        b.text_at(&label, &style::TEST_CASE, MARGIN + 2.5, b.cursor() + 2.0);
        let tag = if is_pass { "[PASS]" } else { "[FAIL]" };
        let tag_color = if is_pass { style::GREEN } else { style::RED };
        let tag_style = TextStyle::new(12.0, true, tag_color);
        let x = MARGIN + 2.5 + b.measure_mm(&label, &style::TEST_CASE) + 3.0;
        b.text_at(tag, &tag_style, x, b.cursor() + 2.0);
        b.advance(height);
    }

    fn failure_block(&self, b: &mut DocBuilder, error: &str, limits: RenderLimits) {
        let message = if error.is_empty() {
            "No error message".to_string()
        } else {
            truncate_chars(error, limits.error_text_chars)
        };
        let text = format!("Failure Reason: {}", message);
        let pad = 2.5;
        let lines = b.wrap(&text, &style::ERROR, CONTENT_W - 2.0 * pad);
        let height = lines.len() as f32 * style::ERROR.line_height_mm() + 2.0 * pad;
        b.ensure_space(height + 2.0);
        b.filled_rect(
            MARGIN,
            b.cursor(),
            CONTENT_W,
            height,
            Some(style::RED_BG),
            Some((style::RED_DARK, 0.75)),
        );
        let mut y = b.cursor() + pad;
        for line in &lines {
            b.text_at(line, &style::ERROR, MARGIN + pad, y);
            y += style::ERROR.line_height_mm();
        }
        b.advance(height);
        b.spacer(3.0);
    }

    /// Evidence laid out two per row with filename captions. Images embed
    /// directly; HTML uses the pre-rendered thumbnail; anything that fails
    /// becomes a visible placeholder line.
    fn evidence_grid(
        &self,
        b: &mut DocBuilder,
        files: &[String],
        limits: RenderLimits,
        thumbs: &ThumbMap,
    ) {
        let shown: Vec<&String> = files
            .iter()
            .filter(|f| {
                let p = Path::new(f.as_str());
                evidence::is_image(p) || evidence::is_html(p)
            })
            .take(limits.evidence_per_case)
            .collect();

        b.paragraph(&format!("Total Screenshots: {}", shown.len()), &style::CAPTION);
        b.spacer(2.0);
        if shown.is_empty() {
            b.paragraph("No displayable evidence for this test case.", &style::CAPTION);
            return;
        }

        for pair in shown.chunks(2) {
            let loaded: Vec<(String, Result<DynamicImage>)> = pair
                .iter()
                .map(|rel| (file_name(rel), self.load_evidence_image(rel, thumbs)))
                .collect();
            self.draw_evidence_row(b, &loaded, limits);
        }
    }

    fn load_evidence_image(&self, rel: &str, thumbs: &ThumbMap) -> Result<DynamicImage> {
        let abs = self.results_root.join(rel);
        let path: PathBuf = if evidence::is_html(&abs) {
            thumbs
                .get(rel)
                .cloned()
                .ok_or_else(|| anyhow!("no raster preview available"))?
        } else {
            abs
        };
        let img = image::open(&path).with_context(|| format!("decoding {}", path.display()))?;
        // Flatten alpha; the PDF stream wants plain RGB
        Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
    }

    fn draw_evidence_row(
        &self,
        b: &mut DocBuilder,
        items: &[(String, Result<DynamicImage>)],
        limits: RenderLimits,
    ) {
        let gap = 8.0;
        let col_w = (CONTENT_W - gap) / 2.0;
        let caption_h = style::CAPTION.line_height_mm() + 1.5;

        let mut row_h: f32 = 0.0;
        for (_, img) in items {
            if let Ok(img) = img {
                let (_, h) = fitted_size(img, col_w.min(limits.image_w_mm), limits.image_h_mm);
                row_h = row_h.max(h);
            } else {
                row_h = row_h.max(style::CAPTION.line_height_mm() * 2.0);
            }
        }
        b.ensure_space(row_h + caption_h + 4.0);

        let top = b.cursor();
        for (i, (name, img)) in items.iter().enumerate() {
            let x = MARGIN + i as f32 * (col_w + gap);
            match img {
                Ok(img) => {
                    let (w, h) =
                        b.image_at(img, x, top, col_w.min(limits.image_w_mm), limits.image_h_mm);
                    let caption = truncate_chars(name, 48);
                    let cx = x + (w - b.measure_mm(&caption, &style::CAPTION)).max(0.0) / 2.0;
                    b.text_at(&caption, &style::CAPTION, cx, top + h + 1.0);
                }
                Err(e) => {
                    log::warn!("Evidence failed to render: {}: {}", name, e);
                    let placeholder = format!("[missing] {}", truncate_chars(name, 40));
                    let err_style = TextStyle::new(9.0, false, style::RED_DARK);
                    b.text_at(&placeholder, &err_style, x, top + 2.0);
                }
            }
        }
        b.advance(row_h + caption_h + 3.0);
    }

    fn footer(&self, b: &mut DocBuilder) {
        b.spacer(10.0);
        b.paragraph_aligned(
            "_______________________________________________",
            &style::FOOTER,
            Align::Center,
        );
        b.spacer(3.0);
        b.paragraph_aligned(
            "Generated by: Test Automation Dashboard v1.0",
            &style::FOOTER,
            Align::Center,
        );
        b.paragraph_aligned(
            &format!(
                "Report Date: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            &style::FOOTER,
            Align::Center,
        );
        b.paragraph_aligned("Confidential - For Internal Use Only", &style::FOOTER, Align::Center);
    }

    /// Single test-case document: header, resolved fields, evidence.
    pub async fn test_case_pdf(
        &self,
        feature: &FeatureSummary,
        run_timestamp: &str,
        case_id: &str,
    ) -> Result<Vec<u8>> {
        let mut thumbs = ThumbMap::new();
        if let Some((_, files)) = evidence::best_match(&feature.test_evidence, case_id) {
            for rel in files.iter().take(MAX_EVIDENCE_PER_CASE) {
                self.resolve_one_thumbnail(rel, &mut thumbs).await;
            }
        }

        let bytes =
            self.test_case_once(feature, run_timestamp, case_id, RenderLimits::standard(), &thumbs)?;
        if bytes.len() <= MAX_PDF_BYTES {
            return Ok(bytes);
        }
        log::warn!("Test case PDF oversized, retrying reduced");
        let bytes =
            self.test_case_once(feature, run_timestamp, case_id, RenderLimits::reduced(), &thumbs)?;
        anyhow::ensure!(
            bytes.len() <= MAX_PDF_BYTES,
            "generated PDF exceeds the size limit even after reduction"
        );
        Ok(bytes)
    }

    fn test_case_once(
        &self,
        feature: &FeatureSummary,
        run_timestamp: &str,
        case_id: &str,
        limits: RenderLimits,
        thumbs: &ThumbMap,
    ) -> Result<Vec<u8>> {
        let (sheet, cols) = self
            .load_feature_sheet(feature)
            .ok_or_else(|| anyhow!("cannot open workbook for {}", feature.feature_name))?;

        let row = workbook::executed_rows(&sheet, &cols)
            .into_iter()
            .find(|row| cols.cell(row, Field::Id).eq_ignore_ascii_case(case_id.trim()))
            .cloned()
            .ok_or_else(|| {
                anyhow!("test case {} not found in {}", case_id, feature.feature_name)
            })?;
        let fields = workbook::extract_fields(&cols, &row);

        let mut b = DocBuilder::new("Test Case Report", self.fonts)?;
        self.title_block(&mut b);
        b.spacer(8.0);

        let pairs = vec![
            ("Feature:".to_string(), feature.feature_name.clone()),
            ("Run:".to_string(), run_timestamp.to_string()),
            ("Test Case:".to_string(), fields.id.clone()),
            (
                "Generated:".to_string(),
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        ];
        b.key_value_table(&pairs);
        b.spacer(8.0);

        let is_pass = fields.status.eq_ignore_ascii_case("pass");
        self.test_case_header(&mut b, &fields.id, is_pass);
        b.spacer(3.0);

        let description = if fields.description.is_empty() {
            "No description available".to_string()
        } else {
            fields.description.clone()
        };
        b.paragraph(&format!("Description: {}", description), &style::NORMAL);
        b.spacer(2.0);
        if !fields.expected.is_empty() {
            b.paragraph(&format!("Expected Result: {}", fields.expected), &style::NORMAL);
            b.spacer(2.0);
        }
        b.paragraph(
            &format!("Status: {}", fields.status.to_uppercase()),
            &TextStyle::new(10.0, true, if is_pass { style::GREEN } else { style::RED }),
        );
        b.spacer(3.0);
        if !is_pass {
            self.failure_block(&mut b, &fields.error, limits);
        }

        if let Some((_, files)) = evidence::best_match(&feature.test_evidence, &fields.id) {
            if !files.is_empty() {
                b.spacer(3.0);
                self.evidence_grid(&mut b, files, limits, thumbs);
            }
        }

        self.footer(&mut b);
        b.finish()
    }

    /// One ZIP with a PDF per executed PASS/FAIL case of a feature.
    pub async fn feature_zip(
        &self,
        feature: &FeatureSummary,
        run_timestamp: &str,
    ) -> Result<Vec<u8>> {
        let entries = self.feature_entries(feature, run_timestamp, "").await?;
        zip_bytes(entries)
    }

    /// One ZIP covering the named features of a run, one folder each.
    /// An empty allow-list means every feature.
    pub async fn run_zip(&self, run: &Run, features: &[String]) -> Result<Vec<u8>> {
        let mut entries = Vec::new();
        for feature in &run.features {
            if !features.is_empty() && !features.contains(&feature.feature_name) {
                continue;
            }
            let prefix = format!("{}/", sanitize_filename(&feature.feature_name));
            match self.feature_entries(feature, &run.timestamp, &prefix).await {
                Ok(mut e) => entries.append(&mut e),
                Err(e) => log::warn!("Skipping {} in zip: {}", feature.feature_name, e),
            }
        }
        zip_bytes(entries)
    }

    async fn feature_entries(
        &self,
        feature: &FeatureSummary,
        run_timestamp: &str,
        prefix: &str,
    ) -> Result<Vec<(String, Vec<u8>)>> {
        let (sheet, cols) = self
            .load_feature_sheet(feature)
            .ok_or_else(|| anyhow!("cannot open workbook for {}", feature.feature_name))?;
        let case_ids: Vec<String> = workbook::executed_rows(&sheet, &cols)
            .into_iter()
            .map(|row| workbook::extract_fields(&cols, row))
            .filter(|f| {
                !f.id.is_empty()
                    && (f.status.eq_ignore_ascii_case("pass")
                        || f.status.eq_ignore_ascii_case("fail"))
            })
            .map(|f| f.id)
            .collect();

        let mut entries = Vec::new();
        for case_id in case_ids {
            match self.test_case_pdf(feature, run_timestamp, &case_id).await {
                Ok(bytes) => {
                    let name = format!(
                        "{}{}_{}.pdf",
                        prefix,
                        sanitize_filename(&feature.feature_name),
                        sanitize_filename(&case_id)
                    );
                    entries.push((name, bytes));
                }
                Err(e) => log::warn!("Skipping case {} in zip: {}", case_id, e),
            }
        }
        Ok(entries)
    }
}

/// Aggregated counts over an export set
pub struct Totals {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
}

impl Totals {
    pub fn over(runs: &[Run]) -> Self {
        let mut totals = Self {
            total: 0,
            passed: 0,
            failed: 0,
        };
        for run in runs {
            for f in &run.features {
                totals.total += f.total;
                totals.passed += f.passed;
                totals.failed += f.failed;
            }
        }
        totals
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64 * 100.0
        }
    }
}

/// First-seen unique (feature, run) pairs across the export set.
pub fn unique_features(runs: &[Run]) -> Vec<&FeatureSummary> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut features = Vec::new();
    for run in runs {
        for f in &run.features {
            if seen.insert((f.feature_name.clone(), run.timestamp.clone())) {
                features.push(f);
            }
        }
    }
    features
}

/// Download name for the dashboard report
pub fn report_filename(failed: u32) -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let suffix = if failed == 0 { "PASS" } else { "FAIL" };
    format!("TestReport_{}_{}.pdf", stamp, suffix)
}

fn zip_bytes(entries: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer.start_file(name, FileOptions::default())?;
        writer.write_all(&bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

fn file_name(rel: &str) -> String {
    Path::new(rel)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| rel.to_string())
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(name: &str, ts: &str, failed: u32) -> FeatureSummary {
        FeatureSummary {
            feature_name: name.to_string(),
            workbook_path: format!("{}/{}/{}.xlsx", ts, name, name),
            total: 3,
            passed: 3 - failed,
            failed,
            pass_rate: 66.67,
            status: if failed == 0 {
                FeatureStatus::Passed
            } else {
                FeatureStatus::Failed
            },
            run_timestamp: ts.to_string(),
            test_evidence: Default::default(),
        }
    }

    #[test]
    fn test_unique_features_dedupes_first_seen() {
        let runs = vec![Run {
            timestamp: "20250620-111221".into(),
            features: vec![
                feature("Transfer", "20250620-111221", 1),
                feature("Transfer", "20250620-111221", 0),
                feature("Login", "20250620-111221", 0),
            ],
        }];
        let unique = unique_features(&runs);
        assert_eq!(unique.len(), 2);
        // First-seen wins
        assert_eq!(unique[0].failed, 1);
    }

    #[test]
    fn test_totals_and_pass_rate() {
        let runs = vec![Run {
            timestamp: "20250620-111221".into(),
            features: vec![
                feature("A", "20250620-111221", 1),
                feature("B", "20250620-111221", 0),
            ],
        }];
        let totals = Totals::over(&runs);
        assert_eq!(totals.total, 6);
        assert_eq!(totals.passed, 5);
        assert_eq!(totals.failed, 1);
        assert!((totals.pass_rate() - 83.333).abs() < 0.01);
    }

    #[test]
    fn test_report_filename_suffix() {
        assert!(report_filename(0).ends_with("_PASS.pdf"));
        assert!(report_filename(2).ends_with("_FAIL.pdf"));
        assert!(report_filename(0).starts_with("TestReport_"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 4), "abcd...");
        // Multi-byte safe
        assert_eq!(truncate_chars("ทดสอบระบบ", 3), "ทดส...");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("TC001/52 2:2"), "TC001_52_2_2");
    }

    #[tokio::test]
    async fn test_dashboard_report_empty_runs() {
        let fonts = FontConfig::latin_fallback();
        let thumbnails = ThumbnailCache::new(vec![]);
        let renderer = Renderer {
            results_root: Path::new("."),
            fonts: &fonts,
            thumbnails: &thumbnails,
        };
        let bytes = renderer
            .dashboard_report(&[], &ExportOptions::default())
            .await
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_zip_of_nothing_is_valid() {
        let bytes = zip_bytes(vec![]).unwrap();
        // Empty zip: end-of-central-directory signature
        assert_eq!(&bytes[0..4], b"PK\x05\x06");
    }
}
