//! Collecting error lines from recorded stderr files.

use crate::error::HarnessResult;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One line containing `error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLine {
    pub file: PathBuf,
    /// 1-based
    pub line_number: usize,
    pub text: String,
}

/// Every line containing `error` (case-sensitive) in the `*.err` files of
/// `dir`, files ordered by fixture number.
pub fn extract_errors(dir: &Path) -> HarnessResult<Vec<ErrorLine>> {
    let pattern = Path::new(&glob::Pattern::escape(&dir.to_string_lossy())).join("*.err");
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();
    files.sort_by_key(|path| sort_key(path));

    let mut lines = Vec::new();
    for file in files {
        let bytes = fs::read(&file)?;
        let content = String::from_utf8_lossy(&bytes);
        for (index, text) in content.lines().enumerate() {
            if text.contains("error") {
                lines.push(ErrorLine {
                    file: file.clone(),
                    line_number: index + 1,
                    text: text.to_string(),
                });
            }
        }
    }
    Ok(lines)
}

/// Numeric stems first in numeric order, anything else after by name
fn sort_key(path: &Path) -> (u8, u64, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.parse::<u64>() {
        Ok(n) => (0, n, stem),
        Err(_) => (1, 0, stem),
    }
}
