//! Results directory scanner
//!
//! Walks the results root and collects feature workbooks from run folders.
//! Run folders are named with a fixed-width timestamp (`YYYYMMDD-HHMMSS` or
//! `YYYYMMDD_HHMMSS`); anything else at the top level is ignored.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Check if a folder name is a valid run timestamp (YYYYMMDD-HHMMSS or YYYYMMDD_HHMMSS).
pub fn is_valid_timestamp(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() != 15 {
        return false;
    }
    if bytes[8] != b'-' && bytes[8] != b'_' {
        return false;
    }
    bytes[..8].iter().all(|b| b.is_ascii_digit()) && bytes[9..].iter().all(|b| b.is_ascii_digit())
}

/// Extract the run timestamp from a workbook path.
///
/// Path components are checked first; if none match, the `_`-separated
/// pieces of the file stem are tried. Returns `"unknown"` when nothing
/// matches, so a misplaced workbook still produces a summary.
pub fn extract_timestamp(path: &Path) -> String {
    for part in path.components() {
        let part = part.as_os_str().to_string_lossy();
        if is_valid_timestamp(&part) {
            return part.into_owned();
        }
    }
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        for piece in stem.split('_') {
            if is_valid_timestamp(piece) {
                return piece.to_string();
            }
        }
    }
    "unknown".to_string()
}

/// Feature name for a workbook: the path component immediately following
/// the timestamp folder, falling back to the workbook file stem.
pub fn extract_feature_name(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    for (i, part) in parts.iter().enumerate() {
        if is_valid_timestamp(part) && i + 1 < parts.len() - 1 {
            return parts[i + 1].clone();
        }
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Find all feature workbooks under valid run folders.
///
/// Only direct children of `results_root` whose names pass the timestamp
/// check are searched; invalid folders are skipped without recursing.
/// Returns paths sorted descending so the most recent run comes first.
/// I/O problems are logged and yield an empty list, never an error.
pub fn find_workbooks(results_root: &Path) -> Vec<PathBuf> {
    if !results_root.is_dir() {
        log::warn!("Results directory not found: {}", results_root.display());
        return Vec::new();
    }

    let entries = match std::fs::read_dir(results_root) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("Cannot read {}: {}", results_root.display(), e);
            return Vec::new();
        }
    };

    let mut workbooks = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_valid_timestamp(&name) {
            log::debug!("Ignoring non-run folder: {}", name);
            continue;
        }
        for file in WalkDir::new(&path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let is_xlsx = file
                .path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("xlsx"))
                .unwrap_or(false);
            // Excel lock files (~$Foo.xlsx) appear while a workbook is open
            let is_lock = file.file_name().to_string_lossy().starts_with("~$");
            if is_xlsx && !is_lock {
                workbooks.push(file.into_path());
            }
        }
    }

    workbooks.sort();
    workbooks.reverse();
    workbooks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_validation() {
        assert!(is_valid_timestamp("20250620-111221"));
        assert!(is_valid_timestamp("20250620_111221"));
        assert!(!is_valid_timestamp("20250620 111221"));
        assert!(!is_valid_timestamp("20250620-11122")); // too short
        assert!(!is_valid_timestamp("20250620-1112211")); // too long
        assert!(!is_valid_timestamp("2025062A-111221"));
        assert!(!is_valid_timestamp("20250620-11122x"));
        assert!(!is_valid_timestamp("results"));
    }

    #[test]
    fn test_extract_timestamp_from_components() {
        let path = Path::new("results/20250620-111221/Transfer/Transfer.xlsx");
        assert_eq!(extract_timestamp(path), "20250620-111221");
    }

    #[test]
    fn test_extract_timestamp_from_stem() {
        let path = Path::new("results/misc/Transfer_20250620_111221.xlsx");
        assert_eq!(extract_timestamp(path), "20250620_111221");
    }

    #[test]
    fn test_extract_timestamp_unknown() {
        let path = Path::new("somewhere/else/data.xlsx");
        assert_eq!(extract_timestamp(path), "unknown");
    }

    #[test]
    fn test_extract_feature_name() {
        let path = Path::new("results/20250620-111221/Transfer/data.xlsx");
        assert_eq!(extract_feature_name(path), "Transfer");
        // Workbook directly in the run folder falls back to the stem
        let path = Path::new("results/20250620-111221/data.xlsx");
        assert_eq!(extract_feature_name(path), "data");
    }

    #[test]
    fn test_find_workbooks_skips_invalid_folders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let valid = root.join("20250620-111221").join("Transfer");
        std::fs::create_dir_all(&valid).unwrap();
        std::fs::write(valid.join("Transfer.xlsx"), b"stub").unwrap();

        // Invalid run folder containing a workbook that must not be found
        let invalid = root.join("archive").join("Transfer");
        std::fs::create_dir_all(&invalid).unwrap();
        std::fs::write(invalid.join("Old.xlsx"), b"stub").unwrap();

        let found = find_workbooks(root);
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("20250620-111221/Transfer/Transfer.xlsx"));
    }

    #[test]
    fn test_find_workbooks_sorted_descending() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for ts in ["20250101-000000", "20250301-000000", "20250201-000000"] {
            let feature = root.join(ts).join("Login");
            std::fs::create_dir_all(&feature).unwrap();
            std::fs::write(feature.join("Login.xlsx"), b"stub").unwrap();
        }
        let found = find_workbooks(root);
        let timestamps: Vec<String> = found.iter().map(|p| extract_timestamp(p)).collect();
        assert_eq!(
            timestamps,
            vec!["20250301-000000", "20250201-000000", "20250101-000000"]
        );
    }

    #[test]
    fn test_find_workbooks_missing_root() {
        assert!(find_workbooks(Path::new("/nonexistent/results")).is_empty());
    }
}
