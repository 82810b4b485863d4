//! Style checker for the AMPL compiler's C sources
//!
//! Checks are line-oriented: each line is matched against a table of named
//! patterns (see [`rules`]). Findings carry a [`Severity`]; only errors fail
//! a check, warnings are counted, and potential errors are informational.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use style::{discover_sources, StyleChecker, StyleSummary};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let checker = StyleChecker::new()?;
//! let reports = discover_sources(Path::new("src"))?
//!     .iter()
//!     .map(|file| checker.check_file(file))
//!     .collect::<Result<Vec<_>, _>>()?;
//! assert!(StyleSummary::from_reports(&reports).passed());
//! # Ok(())
//! # }
//! ```

pub mod checker;
pub mod rules;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use checker::{FileReport, Finding, StyleChecker, StyleSummary};
pub use rules::{Rule, RuleSet, Severity};

/// Errors raised while style checking
#[derive(Error, Debug)]
pub enum StyleError {
    #[error("Invalid rule pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid source glob: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StyleResult<T> = Result<T, StyleError>;

/// All `.c` files below `src_dir`, sorted
pub fn discover_sources(src_dir: &Path) -> StyleResult<Vec<PathBuf>> {
    let pattern = Path::new(&glob::Pattern::escape(&src_dir.to_string_lossy()))
        .join("**")
        .join("*.c");
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Skipping unreadable source entry: {}", e);
                None
            }
        })
        .collect();
    files.sort();
    Ok(files)
}
