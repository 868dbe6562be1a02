//! PDF report generation
//!
//! Turns aggregated run data into the branded dashboard report and the
//! per-test-case documents used by the bulk exports.

pub mod chart;
pub mod fonts;
pub mod layout;
pub mod render;
pub mod style;

pub use fonts::FontConfig;
pub use render::{report_filename, Renderer, MAX_PDF_BYTES};
