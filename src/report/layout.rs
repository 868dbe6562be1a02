//! PDF flow layout
//!
//! printpdf places absolutely; report sections want to flow. DocBuilder
//! keeps a cursor from the top of the page and offers paragraphs, boxed
//! headings, tables and images that wrap and break pages on their own.
//! All distances are millimetres, font sizes points.

use anyhow::Result;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerIndex, PdfLayerReference, PdfPageIndex, Point, Polygon,
};

use super::fonts::{FontConfig, FontSource};
use super::style::{self, pt_to_mm, TextStyle};

pub const PAGE_W: f32 = 210.0;
pub const PAGE_H: f32 = 297.0;
pub const MARGIN: f32 = 18.0;
pub const CONTENT_W: f32 = PAGE_W - 2.0 * MARGIN;

/// Horizontal alignment inside a cell or line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// One table cell: text, style, alignment
#[derive(Debug, Clone)]
pub struct Cell {
    pub text: String,
    pub style: TextStyle,
    pub align: Align,
}

impl Cell {
    pub fn new(text: impl Into<String>, style: TextStyle, align: Align) -> Self {
        Self {
            text: text.into(),
            style,
            align,
        }
    }
}

/// Table colouring
#[derive(Debug, Clone, Copy)]
pub struct TableTheme {
    pub header_bg: u32,
    pub border: u32,
    pub row_bgs: [u32; 2],
}

impl Default for TableTheme {
    fn default() -> Self {
        Self {
            header_bg: style::BROWN,
            border: style::GOLD,
            row_bgs: [style::CREAM_LIGHT, style::CREAM],
        }
    }
}

const CELL_PAD: f32 = 2.2;

pub struct DocBuilder<'a> {
    doc: PdfDocumentReference,
    page: PdfPageIndex,
    layer: PdfLayerIndex,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    fonts: &'a FontConfig,
    /// Cursor, mm from the top edge
    y: f32,
}

impl<'a> DocBuilder<'a> {
    pub fn new(title: &str, fonts: &'a FontConfig) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "content");
        let (regular, bold) = match (&fonts.regular, &fonts.bold) {
            (FontSource::Ttf { bytes: r, .. }, FontSource::Ttf { bytes: b, .. }) => (
                doc.add_external_font(r.as_slice())?,
                doc.add_external_font(b.as_slice())?,
            ),
            _ => (
                doc.add_builtin_font(BuiltinFont::Helvetica)?,
                doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
            ),
        };
        Ok(Self {
            doc,
            page,
            layer,
            regular,
            bold,
            fonts,
            y: MARGIN,
        })
    }

    pub fn layer_ref(&self) -> PdfLayerReference {
        self.doc.get_page(self.page).get_layer(self.layer)
    }

    fn font_ref(&self, bold: bool) -> &IndirectFontRef {
        if bold {
            &self.bold
        } else {
            &self.regular
        }
    }

    pub fn cursor(&self) -> f32 {
        self.y
    }

    pub fn advance(&mut self, mm: f32) {
        self.y += mm;
    }

    pub fn spacer(&mut self, mm: f32) {
        self.y += mm;
    }

    pub fn page_break(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "content");
        self.page = page;
        self.layer = layer;
        self.y = MARGIN;
    }

    /// Break the page unless `needed` mm still fit above the bottom margin.
    pub fn ensure_space(&mut self, needed: f32) {
        if self.y + needed > PAGE_H - MARGIN {
            self.page_break();
        }
    }

    /// Greedy word wrap against the measured text width.
    pub fn wrap(&self, text: &str, style: &TextStyle, width_mm: f32) -> Vec<String> {
        let mut lines = Vec::new();
        for raw_line in text.split('\n') {
            let raw_line = raw_line.trim_end_matches('\r');
            if raw_line.trim().is_empty() {
                lines.push(String::new());
                continue;
            }
            let mut current = String::new();
            for word in raw_line.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{} {}", current, word)
                };
                let width_pt = self.fonts.measure_pt(&candidate, style.size_pt, style.bold);
                if pt_to_mm(width_pt) <= width_mm || current.is_empty() {
                    current = candidate;
                } else {
                    lines.push(current);
                    current = word.to_string();
                }
            }
            lines.push(current);
        }
        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }

    /// Draw a single line with its baseline derived from the cursor-top y.
    fn draw_line(&self, text: &str, style: &TextStyle, x: f32, y_top: f32) {
        if text.is_empty() {
            return;
        }
        let layer = self.layer_ref();
        layer.set_fill_color(style::rgb(style.color));
        let baseline = y_top + pt_to_mm(style.size_pt * 0.85);
        layer.use_text(
            text,
            style.size_pt,
            Mm(x),
            Mm(PAGE_H - baseline),
            self.font_ref(style.bold),
        );
    }

    /// Single line at an absolute position, for chart labels and grids.
    pub fn text_at(&self, text: &str, style: &TextStyle, x: f32, y_top: f32) {
        self.draw_line(text, style, x, y_top);
    }

    /// Rendered width of a single line, mm.
    pub fn measure_mm(&self, text: &str, style: &TextStyle) -> f32 {
        pt_to_mm(self.fonts.measure_pt(text, style.size_pt, style.bold))
    }

    fn aligned_x(&self, text: &str, style: &TextStyle, align: Align, x: f32, width: f32) -> f32 {
        match align {
            Align::Left => x,
            Align::Center | Align::Right => {
                let text_mm = pt_to_mm(self.fonts.measure_pt(text, style.size_pt, style.bold));
                if align == Align::Center {
                    x + ((width - text_mm) / 2.0).max(0.0)
                } else {
                    x + (width - text_mm).max(0.0)
                }
            }
        }
    }

    /// Wrapped paragraph across the content width.
    pub fn paragraph(&mut self, text: &str, style: &TextStyle) {
        self.paragraph_aligned(text, style, Align::Left);
    }

    pub fn paragraph_aligned(&mut self, text: &str, style: &TextStyle, align: Align) {
        let line_h = style.line_height_mm();
        for line in self.wrap(text, style, CONTENT_W) {
            self.ensure_space(line_h);
            let x = self.aligned_x(&line, style, align, MARGIN, CONTENT_W);
            self.draw_line(&line, style, x, self.y);
            self.y += line_h;
        }
    }

    /// Heading on a filled, bordered band, the section-header look.
    pub fn boxed_heading(&mut self, text: &str, style: &TextStyle, bg: u32, border: u32) {
        let pad = 2.5;
        let line_h = style.line_height_mm();
        let lines = self.wrap(text, style, CONTENT_W - 2.0 * pad);
        let height = lines.len() as f32 * line_h + 2.0 * pad;
        self.ensure_space(height + 2.0);
        self.filled_rect(MARGIN, self.y, CONTENT_W, height, Some(bg), Some((border, 1.0)));
        let mut y = self.y + pad;
        for line in &lines {
            self.draw_line(line, style, MARGIN + pad, y);
            y += line_h;
        }
        self.y += height;
    }

    /// Rectangle with optional fill and stroke. `y_top` is mm from page top.
    pub fn filled_rect(
        &self,
        x: f32,
        y_top: f32,
        w: f32,
        h: f32,
        fill: Option<u32>,
        stroke: Option<(u32, f32)>,
    ) {
        let layer = self.layer_ref();
        let mode = match (fill.is_some(), stroke.is_some()) {
            (true, true) => PaintMode::FillStroke,
            (true, false) => PaintMode::Fill,
            (false, true) => PaintMode::Stroke,
            (false, false) => return,
        };
        if let Some(color) = fill {
            layer.set_fill_color(style::rgb(color));
        }
        if let Some((color, thickness)) = stroke {
            layer.set_outline_color(style::rgb(color));
            layer.set_outline_thickness(thickness);
        }
        let y0 = PAGE_H - y_top - h;
        let y1 = PAGE_H - y_top;
        let ring = vec![
            (Point::new(Mm(x), Mm(y0)), false),
            (Point::new(Mm(x + w), Mm(y0)), false),
            (Point::new(Mm(x + w), Mm(y1)), false),
            (Point::new(Mm(x), Mm(y1)), false),
        ];
        layer.add_polygon(Polygon {
            rings: vec![ring],
            mode,
            winding_order: WindingOrder::NonZero,
        });
    }

    /// Horizontal rule across the content width.
    pub fn hline(&mut self, color: u32, thickness: f32) {
        self.ensure_space(2.0);
        self.filled_rect(MARGIN, self.y, CONTENT_W, pt_to_mm(thickness), Some(color), None);
        self.y += pt_to_mm(thickness) + 1.0;
    }

    fn row_height(&self, cells: &[Cell], widths: &[f32]) -> f32 {
        let mut max_lines = 1usize;
        let mut line_h: f32 = 0.0;
        for (cell, width) in cells.iter().zip(widths) {
            let lines = self.wrap(&cell.text, &cell.style, width - 2.0 * CELL_PAD);
            max_lines = max_lines.max(lines.len());
            line_h = line_h.max(cell.style.line_height_mm());
        }
        max_lines as f32 * line_h + 2.0 * CELL_PAD
    }

    fn draw_row(&mut self, cells: &[Cell], widths: &[f32], height: f32, bg: u32, border: u32) {
        let mut x = MARGIN;
        for (cell, width) in cells.iter().zip(widths) {
            self.filled_rect(x, self.y, *width, height, Some(bg), Some((border, 0.75)));
            let lines = self.wrap(&cell.text, &cell.style, width - 2.0 * CELL_PAD);
            let mut y = self.y + CELL_PAD;
            for line in &lines {
                let lx = self.aligned_x(line, &cell.style, cell.align, x + CELL_PAD, width - 2.0 * CELL_PAD);
                self.draw_line(line, &cell.style, lx, y);
                y += cell.style.line_height_mm();
            }
            x += width;
        }
        self.y += height;
    }

    /// Table with a repeated header row. Column widths are mm and should
    /// sum to at most the content width.
    pub fn table(&mut self, widths: &[f32], header: &[Cell], rows: &[Vec<Cell>], theme: &TableTheme) {
        let header_h = self.row_height(header, widths);
        let first_row_h = rows.first().map(|r| self.row_height(r, widths)).unwrap_or(0.0);
        self.ensure_space(header_h + first_row_h);
        self.draw_row(header, widths, header_h, theme.header_bg, theme.border);

        for (i, row) in rows.iter().enumerate() {
            let h = self.row_height(row, widths);
            if self.y + h > PAGE_H - MARGIN {
                self.page_break();
                self.draw_row(header, widths, header_h, theme.header_bg, theme.border);
            }
            let bg = theme.row_bgs[i % 2];
            self.draw_row(row, widths, h, bg, theme.border);
        }
    }

    /// Two-column key/value block, the metadata look.
    pub fn key_value_table(&mut self, pairs: &[(String, String)]) {
        let widths = [50.0, 80.0];
        let rows: Vec<Vec<Cell>> = pairs
            .iter()
            .map(|(k, v)| {
                vec![
                    Cell::new(k.clone(), style::CELL_BOLD, Align::Right),
                    Cell::new(v.clone(), style::CELL, Align::Left),
                ]
            })
            .collect();
        for row in &rows {
            let h = self.row_height(row, &widths);
            self.ensure_space(h);
            self.draw_row(row, &widths, h, style::CREAM_LIGHT, style::GOLD);
        }
    }

    /// Image scaled to fit a box, cursor advances below it.
    pub fn image(&mut self, img: &image::DynamicImage, max_w: f32, max_h: f32, center: bool) {
        let (w, h) = fitted_size(img, max_w, max_h);
        self.ensure_space(h + 2.0);
        let x = if center {
            MARGIN + (CONTENT_W - w) / 2.0
        } else {
            MARGIN
        };
        self.image_at(img, x, self.y, max_w, max_h);
        self.y += h;
    }

    /// Image at an absolute position; returns the rendered size. Does not
    /// advance the cursor, so callers can lay out grids.
    pub fn image_at(&self, img: &image::DynamicImage, x: f32, y_top: f32, max_w: f32, max_h: f32) -> (f32, f32) {
        const DPI: f32 = 96.0;
        let (w, h) = fitted_size(img, max_w, max_h);
        let nat_w = img.width() as f32 * 25.4 / DPI;
        let scale = w / nat_w;
        let pdf_image = printpdf::Image::from_dynamic_image(img);
        pdf_image.add_to_layer(
            self.layer_ref(),
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(PAGE_H - y_top - h)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(DPI),
                ..Default::default()
            },
        );
        (w, h)
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(self.doc.save_to_bytes()?)
    }
}

/// Scale an image to fit a box without upscaling, preserving aspect ratio.
pub fn fitted_size(img: &image::DynamicImage, max_w: f32, max_h: f32) -> (f32, f32) {
    const DPI: f32 = 96.0;
    let nat_w = img.width() as f32 * 25.4 / DPI;
    let nat_h = img.height() as f32 * 25.4 / DPI;
    let ratio = (max_w / nat_w).min(max_h / nat_h).min(1.0);
    (nat_w * ratio, nat_h * ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        let fonts = FontConfig::latin_fallback();
        let builder = DocBuilder::new("t", &fonts).unwrap();
        let style = style::NORMAL;
        let lines = builder.wrap("alpha beta gamma delta epsilon zeta eta theta", &style, 30.0);
        assert!(lines.len() > 1);
        for line in &lines {
            let w = pt_to_mm(fonts.measure_pt(line, style.size_pt, style.bold));
            assert!(w <= 30.0 + 0.01, "line too wide: {:?}", line);
        }
    }

    #[test]
    fn test_wrap_never_drops_words() {
        let fonts = FontConfig::latin_fallback();
        let builder = DocBuilder::new("t", &fonts).unwrap();
        let text = "one two three four five six seven";
        let lines = builder.wrap(text, &style::NORMAL, 25.0);
        let rejoined = lines.join(" ");
        assert_eq!(rejoined.split_whitespace().count(), 7);
    }

    #[test]
    fn test_wrap_single_overlong_word_kept() {
        let fonts = FontConfig::latin_fallback();
        let builder = DocBuilder::new("t", &fonts).unwrap();
        let lines = builder.wrap("averyveryverylongunbreakabletoken", &style::NORMAL, 10.0);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_page_break_on_overflow() {
        let fonts = FontConfig::latin_fallback();
        let mut builder = DocBuilder::new("t", &fonts).unwrap();
        builder.advance(PAGE_H);
        builder.ensure_space(10.0);
        assert!((builder.cursor() - MARGIN).abs() < 1e-6);
    }

    #[test]
    fn test_finish_produces_pdf_bytes() {
        let fonts = FontConfig::latin_fallback();
        let mut builder = DocBuilder::new("t", &fonts).unwrap();
        builder.paragraph("hello report", &style::NORMAL);
        let bytes = builder.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_fitted_size_no_upscale() {
        let img = image::DynamicImage::new_rgb8(96, 96); // ~25.4mm at 96dpi
        let (w, h) = fitted_size(&img, 100.0, 100.0);
        assert!((w - 25.4).abs() < 0.1);
        assert_eq!(w, h);
        let (w2, _) = fitted_size(&img, 10.0, 100.0);
        assert!((w2 - 10.0).abs() < 0.1);
    }
}
