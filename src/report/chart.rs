//! Summary pie chart
//!
//! A two-slice proportion chart drawn straight onto the PDF layer with
//! polygon wedges. Slices with a zero value are omitted so a fully green
//! run renders as a single disc.

use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{Mm, Point, Polygon};

use super::layout::{Align, DocBuilder, CONTENT_W, MARGIN, PAGE_H};
use super::style::{self, TextStyle};

struct Slice {
    label: &'static str,
    value: u32,
    color: u32,
}

const RADIUS: f32 = 28.0;
const ARC_STEP_DEG: f32 = 3.0;

/// Draw the pass/fail proportion chart at the cursor. Does nothing when
/// both counts are zero.
pub fn pie_chart(builder: &mut DocBuilder, passed: u32, failed: u32) {
    let slices: Vec<Slice> = [
        Slice {
            label: "Passed",
            value: passed,
            color: style::GREEN,
        },
        Slice {
            label: "Failed",
            value: failed,
            color: style::RED,
        },
    ]
    .into_iter()
    .filter(|s| s.value > 0)
    .collect();

    if slices.is_empty() {
        return;
    }
    let total: u32 = slices.iter().map(|s| s.value).sum();

    let title = TextStyle::new(14.0, true, style::BROWN);
    let needed = RADIUS * 2.0 + title.line_height_mm() + 14.0;
    builder.ensure_space(needed);

    builder.paragraph_aligned("TEST RESULT", &title, Align::Center);
    builder.spacer(4.0);

    let cx = MARGIN + CONTENT_W / 2.0;
    let cy_top = builder.cursor() + RADIUS;
    let layer = builder.layer_ref();

    // Wedges start at twelve o'clock and run clockwise
    let mut start_deg = 90.0f32;
    for slice in &slices {
        let sweep = slice.value as f32 / total as f32 * 360.0;
        let end_deg = start_deg - sweep;

        let mut ring: Vec<(Point, bool)> = Vec::new();
        // Full-circle wedges need no centre spoke
        if slices.len() > 1 {
            ring.push((point_at(cx, cy_top, 0.0, 0.0), false));
        }
        let mut deg = start_deg;
        loop {
            ring.push((point_at(cx, cy_top, RADIUS, deg), false));
            if deg <= end_deg {
                break;
            }
            deg = (deg - ARC_STEP_DEG).max(end_deg);
        }

        layer.set_fill_color(style::rgb(slice.color));
        layer.set_outline_color(style::rgb(style::GOLD));
        layer.set_outline_thickness(1.5);
        layer.add_polygon(Polygon {
            rings: vec![ring],
            mode: PaintMode::FillStroke,
            winding_order: WindingOrder::NonZero,
        });

        // Percentage label at the wedge midpoint
        let mid_deg = start_deg - sweep / 2.0;
        let pct = slice.value as f32 / total as f32 * 100.0;
        let label = format!("{:.2}%", pct);
        let label_style = TextStyle::new(10.0, true, style::WHITE);
        let (lx, ly) = label_anchor(cx, cy_top, RADIUS * 0.55, mid_deg);
        let lx = lx - builder.measure_mm(&label, &label_style) / 2.0;
        builder.text_at(&label, &label_style, lx, ly - 2.0);

        start_deg = end_deg;
    }

    builder.advance(RADIUS * 2.0 + 4.0);

    // Legend line under the disc
    let legend_style = TextStyle::new(9.0, false, style::INK);
    let legend = slices
        .iter()
        .map(|s| format!("{}: {}", s.label, s.value))
        .collect::<Vec<_>>()
        .join("    ");
    builder.paragraph_aligned(&legend, &legend_style, Align::Center);
    builder.spacer(4.0);
}

fn point_at(cx: f32, cy_top: f32, radius: f32, deg: f32) -> Point {
    let rad = deg.to_radians();
    let x = cx + radius * rad.cos();
    let y_top = cy_top - radius * rad.sin();
    Point::new(Mm(x), Mm(PAGE_H - y_top))
}

fn label_anchor(cx: f32, cy_top: f32, radius: f32, deg: f32) -> (f32, f32) {
    let rad = deg.to_radians();
    (cx + radius * rad.cos(), cy_top - radius * rad.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fonts::FontConfig;

    #[test]
    fn test_chart_renders_with_zero_slice_omitted() {
        let fonts = FontConfig::latin_fallback();
        let mut builder = DocBuilder::new("chart", &fonts).unwrap();
        let before = builder.cursor();
        pie_chart(&mut builder, 5, 0);
        assert!(builder.cursor() > before);
        let bytes = builder.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_chart_noop_when_empty() {
        let fonts = FontConfig::latin_fallback();
        let mut builder = DocBuilder::new("chart", &fonts).unwrap();
        let before = builder.cursor();
        pie_chart(&mut builder, 0, 0);
        assert_eq!(builder.cursor(), before);
    }
}
