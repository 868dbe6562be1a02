//! Thumbnail cache for HTML evidence
//!
//! Rendered previews are stored in a `.thumbnails` folder beside each
//! source file, so same-named captures in different test-case folders
//! never collide. Cache files are keyed by a hash of the absolute source
//! path and regenerated when the source is newer.

pub mod backend;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use backend::{inline_svg_placeholder, ThumbnailBackend};

pub const THUMBNAIL_DIR: &str = ".thumbnails";

/// What a thumbnail request resolved to
pub enum Thumbnail {
    /// A PNG on disk, cached or freshly rendered
    File(PathBuf),
    /// Inline vector placeholder; nothing could be written
    InlineSvg(String),
}

/// Deterministic cache location for a source file:
/// `<dir>/.thumbnails/<sha256(abs path)[..16]>_<stem>.png`.
pub fn cache_path(source: &Path) -> PathBuf {
    let absolute = source
        .canonicalize()
        .unwrap_or_else(|_| source.to_path_buf());
    let digest = Sha256::digest(absolute.to_string_lossy().as_bytes());
    let mut hash = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hash.push_str(&format!("{:02x}", byte));
    }
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    source
        .parent()
        .unwrap_or(Path::new("."))
        .join(THUMBNAIL_DIR)
        .join(format!("{}_{}.png", hash, stem))
}

/// A thumbnail is stale when missing or older than its source.
pub fn is_stale(source: &Path, thumbnail: &Path) -> bool {
    let Ok(thumb_meta) = std::fs::metadata(thumbnail) else {
        return true;
    };
    let source_mtime = std::fs::metadata(source).and_then(|m| m.modified());
    let thumb_mtime = thumb_meta.modified();
    match (source_mtime, thumb_mtime) {
        (Ok(s), Ok(t)) => s > t,
        // Unreadable mtimes: keep serving what we have
        _ => false,
    }
}

/// The cache with its ordered render backends
pub struct ThumbnailCache {
    backends: Vec<Box<dyn ThumbnailBackend>>,
}

impl ThumbnailCache {
    pub fn new(backends: Vec<Box<dyn ThumbnailBackend>>) -> Self {
        Self { backends }
    }

    /// Standard stack: headless Chrome first, placeholder raster second.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(backend::ChromiumBackend::new()),
            Box::new(backend::PlaceholderBackend),
        ])
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Resolve the thumbnail for an HTML evidence file, regenerating when
    /// stale. Two concurrent requests may both regenerate; writes are
    /// whole-file so the race is harmless.
    pub async fn get_thumbnail(&self, source: &Path) -> Result<Thumbnail> {
        anyhow::ensure!(source.is_file(), "source not found: {}", source.display());

        let thumb = cache_path(source);
        if !is_stale(source, &thumb) {
            return Ok(Thumbnail::File(thumb));
        }

        if let Some(parent) = thumb.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        for backend in &self.backends {
            match backend.render(source, &thumb).await {
                Ok(()) => {
                    log::debug!(
                        "Rendered thumbnail via {}: {}",
                        backend.name(),
                        thumb.display()
                    );
                    return Ok(Thumbnail::File(thumb));
                }
                Err(e) => {
                    log::warn!(
                        "Thumbnail backend {} failed for {}: {}",
                        backend.name(),
                        source.display(),
                        e
                    );
                }
            }
        }

        Ok(Thumbnail::InlineSvg(inline_svg_placeholder(source)))
    }
}

/// Cache statistics for the maintenance endpoints
#[derive(Debug, Default, Serialize)]
pub struct CacheInfo {
    pub folders: usize,
    pub files: usize,
    pub total_bytes: u64,
}

fn thumbnail_dirs(results_root: &Path) -> Vec<PathBuf> {
    WalkDir::new(results_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.file_name() == THUMBNAIL_DIR)
        .map(|e| e.into_path())
        .collect()
}

/// Count cached thumbnails anywhere under the results root.
pub fn cache_info(results_root: &Path) -> CacheInfo {
    let mut info = CacheInfo::default();
    for dir in thumbnail_dirs(results_root) {
        info.folders += 1;
        for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                info.files += 1;
                info.total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
    }
    info
}

/// Remove every `.thumbnails` folder under the results root. Covers both
/// the old centralized layout and the per-test-case layout. When
/// `ignore_errors` is set, folders that fail to delete are skipped instead
/// of aborting the sweep.
pub fn clear_cache(results_root: &Path, ignore_errors: bool) -> Result<usize> {
    let mut removed = 0;
    for dir in thumbnail_dirs(results_root) {
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => removed += 1,
            Err(e) if ignore_errors => {
                log::warn!("Could not remove {}: {}", dir.display(), e);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("removing {}", dir.display()));
            }
        }
    }
    Ok(removed)
}

/// Remove only stale entries: thumbnails whose source was deleted, whose
/// source is newer, or files that no current source maps to.
pub fn cleanup_stale(results_root: &Path) -> Result<usize> {
    let mut removed = 0;
    for dir in thumbnail_dirs(results_root) {
        let parent = match dir.parent() {
            Some(p) => p.to_path_buf(),
            None => continue,
        };
        // Expected cache file per live HTML source in the parent folder
        let mut expected: Vec<(PathBuf, PathBuf)> = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&parent) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() && crate::workbook::evidence::is_html(&path) {
                    expected.push((cache_path(&path), path));
                }
            }
        }
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let cached = entry.path();
                let source = expected
                    .iter()
                    .find(|(c, _)| *c == cached)
                    .map(|(_, s)| s.clone());
                let keep = match source {
                    Some(src) => !is_stale(&src, &cached),
                    None => false,
                };
                if !keep {
                    if std::fs::remove_file(&cached).is_ok() {
                        removed += 1;
                    }
                }
            }
        }
        // Drop the folder itself once emptied
        let _ = std::fs::remove_dir(&dir);
    }
    Ok(removed)
}
