//! Report font selection
//!
//! Failure descriptions and test data frequently contain Thai text, which
//! the built-in PDF fonts cannot encode. At startup a fixed list of
//! filesystem locations is probed for a Thai-capable regular/bold TTF
//! pair; the result is carried in a [`FontConfig`] value handed to every
//! renderer, so one probe covers all reports and nothing is process-global.

use rusttype::{point, Scale};

/// Known Thai-capable font pairs (regular, bold), most specific first
const FONT_CANDIDATES: &[(&str, &str)] = &[
    (
        "/usr/share/fonts/truetype/thai-scalable/THSarabunNew.ttf",
        "/usr/share/fonts/truetype/thai-scalable/THSarabunNew-Bold.ttf",
    ),
    (
        "/usr/share/fonts/truetype/tlwg/Loma.ttf",
        "/usr/share/fonts/truetype/tlwg/Loma-Bold.ttf",
    ),
    (
        "/usr/share/fonts/truetype/noto/NotoSansThai-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSansThai-Bold.ttf",
    ),
    (
        "/usr/share/fonts/opentype/noto/NotoSansThai-Regular.ttf",
        "/usr/share/fonts/opentype/noto/NotoSansThai-Bold.ttf",
    ),
    (
        "C:\\Windows\\Fonts\\tahoma.ttf",
        "C:\\Windows\\Fonts\\tahomabd.ttf",
    ),
    (
        "/System/Library/Fonts/Supplemental/Tahoma.ttf",
        "/System/Library/Fonts/Supplemental/Tahoma Bold.ttf",
    ),
];

/// One face: embedded TTF bytes, or a built-in Latin fallback
pub enum FontSource {
    Builtin,
    Ttf {
        bytes: Vec<u8>,
        font: rusttype::Font<'static>,
    },
}

/// The regular/bold pair every renderer draws with
pub struct FontConfig {
    pub regular: FontSource,
    pub bold: FontSource,
    description: String,
}

impl FontConfig {
    /// Probe the candidate list; first pair that loads wins.
    pub fn detect() -> Self {
        for (regular_path, bold_path) in FONT_CANDIDATES {
            match (load_ttf(regular_path), load_ttf(bold_path)) {
                (Some(regular), Some(bold)) => {
                    log::debug!("Report fonts: {}", regular_path);
                    return Self {
                        regular,
                        bold,
                        description: format!("embedded ({})", regular_path),
                    };
                }
                _ => continue,
            }
        }
        log::warn!("No Thai-capable font found; falling back to Helvetica");
        Self::latin_fallback()
    }

    /// Built-in Helvetica pair; Latin text only.
    pub fn latin_fallback() -> Self {
        Self {
            regular: FontSource::Builtin,
            bold: FontSource::Builtin,
            description: "builtin (Helvetica)".to_string(),
        }
    }

    pub fn describe(&self) -> &str {
        &self.description
    }

    /// Approximate rendered width of `text` in points.
    ///
    /// Embedded fonts are measured from their glyph metrics; the built-in
    /// fallback uses an average Helvetica advance, close enough for line
    /// wrapping.
    pub fn measure_pt(&self, text: &str, size_pt: f32, bold: bool) -> f32 {
        let source = if bold { &self.bold } else { &self.regular };
        match source {
            FontSource::Builtin => text.chars().count() as f32 * size_pt * 0.52,
            FontSource::Ttf { font, .. } => {
                let scale = Scale::uniform(size_pt);
                font.layout(text, scale, point(0.0, 0.0))
                    .last()
                    .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
                    .unwrap_or(0.0)
            }
        }
    }
}

fn load_ttf(path: &str) -> Option<FontSource> {
    let bytes = std::fs::read(path).ok()?;
    let font = rusttype::Font::try_from_vec(bytes.clone())?;
    Some(FontSource::Ttf { bytes, font })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_measures_monotonically() {
        let fonts = FontConfig::latin_fallback();
        let short = fonts.measure_pt("abc", 10.0, false);
        let long = fonts.measure_pt("abcdef", 10.0, false);
        assert!(long > short);
        assert!(short > 0.0);
    }

    #[test]
    fn test_detect_never_panics() {
        // Whatever the host has installed, detection must settle on a pair
        let fonts = FontConfig::detect();
        assert!(!fonts.describe().is_empty());
    }
}
