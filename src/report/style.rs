//! Report styling
//!
//! Colour palette and text styles for the branded report theme. Values
//! mirror the dashboard's golden-brown banking theme.

use printpdf::{Color, Rgb};

/// Deep brown used for headings and table headers
pub const BROWN: u32 = 0x8B4513;
/// Golden border colour
pub const GOLD: u32 = 0xD4AF37;
/// Darker gold for separators
pub const GOLD_DARK: u32 = 0xB8860B;
/// Golden rod for rates and subheadings
pub const GOLDENROD: u32 = 0xDAA520;
/// Cream backgrounds
pub const CREAM: u32 = 0xFFF8DC;
pub const CREAM_LIGHT: u32 = 0xFFFEF7;
pub const LEMON: u32 = 0xFFFACD;
/// Body text
pub const INK: u32 = 0x2F4F4F;
/// Pass green / fail red
pub const GREEN: u32 = 0x228B22;
pub const RED: u32 = 0xCD5C5C;
pub const RED_DARK: u32 = 0xB71C1C;
pub const RED_BG: u32 = 0xFFEBEE;
pub const GREEN_BG: u32 = 0xE8F5E8;
pub const AMBER_BG: u32 = 0xFFF3E0;
pub const GRAY_BG: u32 = 0xF5F5F5;
/// Captions and footer
pub const GRAY: u32 = 0x666666;
pub const WHITE: u32 = 0xFFFFFF;

/// Hex colour to the PDF colour space
pub fn rgb(hex: u32) -> Color {
    let r = ((hex >> 16) & 0xFF) as f32 / 255.0;
    let g = ((hex >> 8) & 0xFF) as f32 / 255.0;
    let b = (hex & 0xFF) as f32 / 255.0;
    Color::Rgb(Rgb::new(r, g, b, None))
}

/// Text style for a paragraph or cell
#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub size_pt: f32,
    pub bold: bool,
    pub color: u32,
}

impl TextStyle {
    pub const fn new(size_pt: f32, bold: bool, color: u32) -> Self {
        Self {
            size_pt,
            bold,
            color,
        }
    }

    /// Line height: 1.2x the font size, in mm
    pub fn line_height_mm(&self) -> f32 {
        pt_to_mm(self.size_pt * 1.2)
    }
}

/// Title: 18pt brown, centred by the layout
pub const TITLE: TextStyle = TextStyle::new(18.0, true, BROWN);
/// Section headers: 14pt brown on cream
pub const HEADING: TextStyle = TextStyle::new(14.0, true, BROWN);
/// Subheadings: 12pt golden rod
pub const SUBHEADING: TextStyle = TextStyle::new(12.0, true, GOLDENROD);
/// Feature subsection headers: 12pt dark gold on lemon
pub const FEATURE: TextStyle = TextStyle::new(12.0, true, GOLD_DARK);
/// Test-case headers inside the evidence section
pub const TEST_CASE: TextStyle = TextStyle::new(12.0, true, GOLD_DARK);
/// Body text: 10pt slate
pub const NORMAL: TextStyle = TextStyle::new(10.0, false, INK);
/// Screenshot captions: 9pt grey
pub const CAPTION: TextStyle = TextStyle::new(9.0, false, GRAY);
/// Failure blocks: 10pt bold dark red
pub const ERROR: TextStyle = TextStyle::new(10.0, true, RED_DARK);
/// Footer: 8pt grey, centred
pub const FOOTER: TextStyle = TextStyle::new(8.0, false, GRAY);
/// Table cells: 9pt
pub const CELL: TextStyle = TextStyle::new(9.0, false, INK);
pub const CELL_BOLD: TextStyle = TextStyle::new(9.0, true, BROWN);
pub const TABLE_HEADER: TextStyle = TextStyle::new(9.0, true, WHITE);

pub fn pt_to_mm(pt: f32) -> f32 {
    pt * 25.4 / 72.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_splits_channels() {
        match rgb(0xFF0080) {
            Color::Rgb(c) => {
                assert!((c.r - 1.0).abs() < 1e-6);
                assert!(c.g.abs() < 1e-6);
                assert!((c.b - 128.0 / 255.0).abs() < 1e-3);
            }
            _ => panic!("expected rgb"),
        }
    }

    #[test]
    fn test_pt_to_mm() {
        assert!((pt_to_mm(72.0) - 25.4).abs() < 1e-4);
    }
}
