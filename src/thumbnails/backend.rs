//! Thumbnail render backends
//!
//! An HTML evidence file becomes a raster preview through the first
//! backend that succeeds: a headless Chrome full-page capture, then a
//! static placeholder image carrying the filename. When neither can write
//! a file, callers fall back to [`inline_svg_placeholder`].

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures_util::StreamExt;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};

/// Renders an HTML file into a PNG at `dest`
#[async_trait]
pub trait ThumbnailBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn render(&self, source: &Path, dest: &Path) -> Result<()>;
}

/// Chrome binaries probed for availability, most common first
const CHROME_BINARIES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Headless Chrome capture. Each render launches and tears down its own
/// browser; captures are rare enough that pooling is not worth the state.
pub struct ChromiumBackend {
    window_size: (u32, u32),
}

impl ChromiumBackend {
    pub fn new() -> Self {
        Self {
            window_size: (1280, 1024),
        }
    }

    /// Best-effort check that some Chrome binary exists on PATH.
    pub fn is_available() -> bool {
        CHROME_BINARIES.iter().any(|b| which::which(b).is_ok())
    }
}

impl Default for ChromiumBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThumbnailBackend for ChromiumBackend {
    fn name(&self) -> &'static str {
        "chromium"
    }

    async fn render(&self, source: &Path, dest: &Path) -> Result<()> {
        let source = source
            .canonicalize()
            .with_context(|| format!("source not found: {}", source.display()))?;

        let config = BrowserConfig::builder()
            .window_size(self.window_size.0, self.window_size.1)
            .args(["--no-sandbox", "--disable-gpu"])
            .build()
            .map_err(|e| anyhow!("browser config: {}", e))?;

        let (mut browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let result = async {
            let url = format!("file://{}", source.display());
            let page = browser.new_page(url).await?;
            page.wait_for_navigation().await?;
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build();
            let bytes = page.screenshot(params).await?;
            std::fs::write(dest, bytes)?;
            Ok::<_, anyhow::Error>(())
        }
        .await;

        let _ = browser.close().await;
        handler_task.abort();
        result
    }
}

/// Fonts usable for placeholder captions; any Latin face will do
const PLACEHOLDER_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn load_caption_font() -> Option<Font<'static>> {
    for path in PLACEHOLDER_FONTS {
        if let Ok(bytes) = std::fs::read(path) {
            if let Some(font) = Font::try_from_vec(bytes) {
                return Some(font);
            }
        }
    }
    None
}

/// Static placeholder image with the source filename. Used whenever the
/// browser capture fails; without a usable caption font the image is still
/// produced, just unlabelled.
pub struct PlaceholderBackend;

const PLACEHOLDER_W: u32 = 800;
const PLACEHOLDER_H: u32 = 600;

impl PlaceholderBackend {
    pub fn render_placeholder(source: &Path) -> RgbaImage {
        let bg = Rgba([248u8, 249, 250, 255]);
        let border = Rgba([222u8, 226, 230, 255]);
        let band = Rgba([255u8, 248, 220, 255]);
        let text_color = Rgba([73u8, 80, 87, 255]);

        let mut img = RgbaImage::from_pixel(PLACEHOLDER_W, PLACEHOLDER_H, bg);
        draw_filled_rect_mut(
            &mut img,
            Rect::at(0, 0).of_size(PLACEHOLDER_W, 80),
            band,
        );
        draw_hollow_rect_mut(
            &mut img,
            Rect::at(0, 0).of_size(PLACEHOLDER_W, PLACEHOLDER_H),
            border,
        );
        draw_hollow_rect_mut(
            &mut img,
            Rect::at(1, 1).of_size(PLACEHOLDER_W - 2, PLACEHOLDER_H - 2),
            border,
        );

        if let Some(font) = load_caption_font() {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "evidence.html".to_string());
            draw_text_mut(
                &mut img,
                text_color,
                24,
                26,
                Scale::uniform(28.0),
                &font,
                &name,
            );
            draw_text_mut(
                &mut img,
                text_color,
                24,
                280,
                Scale::uniform(22.0),
                &font,
                "HTML preview not available",
            );
        }
        img
    }
}

#[async_trait]
impl ThumbnailBackend for PlaceholderBackend {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    async fn render(&self, source: &Path, dest: &Path) -> Result<()> {
        let img = Self::render_placeholder(source);
        img.save(dest)
            .with_context(|| format!("writing placeholder {}", dest.display()))?;
        Ok(())
    }
}

/// Last resort when no raster backend can write: an inline vector
/// placeholder served directly, never touching the filesystem.
pub fn inline_svg_placeholder(source: &Path) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "evidence.html".to_string());
    let name = name.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="800" height="600">
  <rect width="800" height="600" fill="#F8F9FA" stroke="#DEE2E6"/>
  <rect width="800" height="80" fill="#FFF8DC"/>
  <text x="24" y="50" font-family="sans-serif" font-size="28" fill="#495057">{}</text>
  <text x="24" y="300" font-family="sans-serif" font-size="22" fill="#495057">HTML preview not available</text>
</svg>
"##,
        name
    )
}
