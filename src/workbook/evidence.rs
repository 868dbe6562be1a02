//! Evidence file discovery
//!
//! Screenshots, HTML captures and spreadsheets live in test-case
//! subfolders beside each feature workbook (`Transfer/TC001/step1.png`).
//! Files at the feature root are grouped under `"General"`.

use std::collections::BTreeMap;
use std::path::Path;

use walkdir::WalkDir;

/// Raster formats embedded directly into reports
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// HTML captures, rendered through the thumbnail cache
pub const HTML_EXTENSIONS: &[&str] = &["html", "htm"];

/// Everything collected as evidence
pub const EVIDENCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "html", "htm", "xlsx"];

pub fn is_image(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

pub fn is_html(path: &Path) -> bool {
    has_extension(path, HTML_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// Path relative to `root` with forward slashes, for serving over HTTP.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Collect evidence files under a feature directory, grouped by test-case
/// folder (the first path segment under the feature). The feature workbook
/// itself and `.thumbnails` caches are skipped. Paths in the result are
/// relative to `results_root`.
pub fn discover_evidence(
    feature_dir: &Path,
    results_root: &Path,
) -> BTreeMap<String, Vec<String>> {
    let mut evidence: BTreeMap<String, Vec<String>> = BTreeMap::new();

    let walker = WalkDir::new(feature_dir).into_iter().filter_entry(|e| {
        !(e.file_type().is_dir() && e.file_name() == ".thumbnails")
    });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !has_extension(path, EVIDENCE_EXTENSIONS) {
            continue;
        }
        let rel_to_feature = match path.strip_prefix(feature_dir) {
            Ok(r) => r,
            Err(_) => continue,
        };
        // The workbook sits at the feature root; it is the source, not evidence
        if rel_to_feature.components().count() == 1 && has_extension(path, &["xlsx"]) {
            continue;
        }
        let group = rel_to_feature
            .components()
            .next()
            .filter(|_| rel_to_feature.components().count() > 1)
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .unwrap_or_else(|| "General".to_string());

        if let Some(rel) = relative_path(results_root, path) {
            evidence.entry(group).or_default().push(rel);
        } else {
            log::debug!("Evidence outside results root: {}", path.display());
        }
    }

    for files in evidence.values_mut() {
        files.sort();
    }
    evidence
}

/// Find the evidence folder for a test-case id: exact name first, then the
/// first folder (in sorted order) named `<id>_...` or `<id>-...`. First
/// match wins when several folders share the prefix.
pub fn best_match<'a>(
    evidence: &'a BTreeMap<String, Vec<String>>,
    case_id: &str,
) -> Option<(&'a str, &'a [String])> {
    if let Some((name, files)) = evidence.get_key_value(case_id) {
        return Some((name.as_str(), files.as_slice()));
    }
    evidence
        .iter()
        .find(|(name, _)| {
            name.starts_with(&format!("{}_", case_id)) || name.starts_with(&format!("{}-", case_id))
        })
        .map(|(name, files)| (name.as_str(), files.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_evidence(names: &[&str]) -> BTreeMap<String, Vec<String>> {
        names
            .iter()
            .map(|n| (n.to_string(), vec![format!("{}/shot.png", n)]))
            .collect()
    }

    #[test]
    fn test_best_match_exact_wins() {
        let ev = make_evidence(&["TC001", "TC001_52224444444"]);
        assert_eq!(best_match(&ev, "TC001").unwrap().0, "TC001");
    }

    #[test]
    fn test_best_match_prefix() {
        let ev = make_evidence(&["TC001_52224444444", "TC002"]);
        assert_eq!(best_match(&ev, "TC001").unwrap().0, "TC001_52224444444");
    }

    #[test]
    fn test_best_match_first_of_several_prefixes() {
        // Sorted map order makes "first match" deterministic
        let ev = make_evidence(&["TC001_bbb", "TC001_aaa"]);
        assert_eq!(best_match(&ev, "TC001").unwrap().0, "TC001_aaa");
    }

    #[test]
    fn test_best_match_rejects_longer_ids() {
        let ev = make_evidence(&["TC0011"]);
        assert!(best_match(&ev, "TC001").is_none());
    }

    #[test]
    fn test_discover_groups_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let feature = root.join("20250620-111221").join("Transfer");
        std::fs::create_dir_all(feature.join("TC001")).unwrap();
        std::fs::create_dir_all(feature.join(".thumbnails")).unwrap();
        std::fs::write(feature.join("Transfer.xlsx"), b"wb").unwrap();
        std::fs::write(feature.join("overview.png"), b"img").unwrap();
        std::fs::write(feature.join("TC001/step1.png"), b"img").unwrap();
        std::fs::write(feature.join("TC001/capture.html"), b"<html>").unwrap();
        std::fs::write(feature.join("TC001/notes.txt"), b"skip").unwrap();
        std::fs::write(feature.join(".thumbnails/x.png"), b"cached").unwrap();

        let ev = discover_evidence(&feature, root);
        assert_eq!(
            ev.get("General").unwrap(),
            &vec!["20250620-111221/Transfer/overview.png".to_string()]
        );
        let tc = ev.get("TC001").unwrap();
        assert_eq!(tc.len(), 2);
        assert!(tc[0].ends_with("TC001/capture.html"));
        assert!(tc[1].ends_with("TC001/step1.png"));
        // Workbook, .txt and .thumbnails content excluded
        assert_eq!(ev.len(), 2);
    }
}
