//! Directory conventions of an AMPL compiler checkout.
//!
//! ```text
//! <root>/
//!   src/                 compiler sources, `make test{module}` runs here
//!   bin/test{module}     stage driver produced by make
//!   test/                working directory for driver runs
//!     tests/{n}.ampl     fixture programs
//!     {module}/{n}.out   expected stdout
//!     {module}/{n}.err   expected stderr
//!     temp/              actual outputs of the current run
//! ```

use crate::{FixtureError, FixtureResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Output stream of a stage driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    /// File extension used for recorded output of this stream
    pub fn extension(&self) -> &'static str {
        match self {
            Stream::Stdout => "out",
            Stream::Stderr => "err",
        }
    }
}

/// A compiler stage with its own test driver (`scanner`, `symboltable`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Module(String);

impl Module {
    /// Validate and wrap a stage name.
    ///
    /// The name is spliced into `make test{module}` and `bin/test{module}`,
    /// so only lowercase ASCII letters and digits are accepted.
    pub fn new(name: impl Into<String>) -> FixtureResult<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        if !valid {
            return Err(FixtureError::InvalidModule { name });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Make target building this stage's driver
    pub fn make_target(&self) -> String {
        format!("test{}", self.0)
    }

    /// Name with the first letter upper-cased, for console messages
    pub fn title(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Module {
    type Err = FixtureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Module::new(s)
    }
}

impl TryFrom<String> for Module {
    type Error = FixtureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Module::new(value)
    }
}

impl From<Module> for String {
    fn from(module: Module) -> Self {
        module.0
    }
}

/// Paths of a compiler checkout rooted at `root`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Stage driver binary, `bin/test{module}`
    pub fn driver(&self, module: &Module) -> PathBuf {
        self.bin_dir().join(module.make_target())
    }

    /// Working directory for driver runs
    pub fn test_dir(&self) -> PathBuf {
        self.root.join("test")
    }

    pub fn inputs_dir(&self) -> PathBuf {
        self.test_dir().join("tests")
    }

    /// Fixture program path relative to [`test_dir`](Self::test_dir).
    ///
    /// Drivers get this relative form so that file names in their
    /// diagnostics match the recorded expected output.
    pub fn input_arg(&self, number: u32) -> PathBuf {
        Path::new("tests").join(format!("{number}.ampl"))
    }

    pub fn input(&self, number: u32) -> PathBuf {
        self.test_dir().join(self.input_arg(number))
    }

    pub fn expected_dir(&self, module: &Module) -> PathBuf {
        self.test_dir().join(module.as_str())
    }

    pub fn expected(&self, module: &Module, number: u32, stream: Stream) -> PathBuf {
        self.expected_dir(module)
            .join(format!("{number}.{}", stream.extension()))
    }

    /// Scratch directory holding actual outputs of the current run
    pub fn scratch_dir(&self) -> PathBuf {
        self.test_dir().join("temp")
    }

    pub fn actual(&self, number: u32, stream: Stream) -> PathBuf {
        self.scratch_dir()
            .join(format!("{number}.{}", stream.extension()))
    }
}

/// Numbers of all `tests/*.ampl` fixtures, ascending.
///
/// Files whose stem is not a number are skipped.
pub fn list_fixtures(layout: &ProjectLayout) -> FixtureResult<Vec<u32>> {
    let inputs = layout.inputs_dir();
    let pattern = Path::new(&glob::Pattern::escape(&inputs.to_string_lossy())).join("*.ampl");
    let mut numbers = Vec::new();

    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Skipping unreadable fixture entry: {}", e);
                continue;
            }
        };
        if let Some(number) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u32>().ok())
        {
            numbers.push(number);
        }
    }

    numbers.sort_unstable();
    Ok(numbers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_module_validation() {
        assert!(Module::new("scanner").is_ok());
        assert!(Module::new("symboltable").is_ok());
        assert!(Module::new("stage2").is_ok());

        assert!(Module::new("").is_err());
        assert!(Module::new("Scanner").is_err());
        assert!(Module::new("scanner; rm -rf /").is_err());
        assert!(Module::new("../scanner").is_err());
    }

    #[test]
    fn test_module_names() {
        let module = Module::new("hashtable").unwrap();
        assert_eq!(module.make_target(), "testhashtable");
        assert_eq!(module.title(), "Hashtable");
        assert_eq!(module.to_string(), "hashtable");
    }

    #[test]
    fn test_layout_paths() {
        let layout = ProjectLayout::new("/project");
        let scanner = Module::new("scanner").unwrap();

        assert_eq!(layout.src_dir(), PathBuf::from("/project/src"));
        assert_eq!(
            layout.driver(&scanner),
            PathBuf::from("/project/bin/testscanner")
        );
        assert_eq!(layout.input_arg(7), PathBuf::from("tests/7.ampl"));
        assert_eq!(layout.input(7), PathBuf::from("/project/test/tests/7.ampl"));
        assert_eq!(
            layout.expected(&scanner, 7, Stream::Stdout),
            PathBuf::from("/project/test/scanner/7.out")
        );
        assert_eq!(
            layout.expected(&scanner, 7, Stream::Stderr),
            PathBuf::from("/project/test/scanner/7.err")
        );
        assert_eq!(
            layout.actual(3, Stream::Stderr),
            PathBuf::from("/project/test/temp/3.err")
        );
    }

    #[test]
    fn test_list_fixtures_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        fs::create_dir_all(layout.inputs_dir()).unwrap();

        for name in ["10.ampl", "2.ampl", "0.ampl", "notes.ampl", "3.txt"] {
            fs::write(layout.inputs_dir().join(name), "program p:").unwrap();
        }

        assert_eq!(list_fixtures(&layout).unwrap(), vec![0, 2, 10]);
    }

    #[test]
    fn test_list_fixtures_under_bracketed_root() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path().join("ampl [copy]*"));
        fs::create_dir_all(layout.inputs_dir()).unwrap();
        fs::write(layout.input(4), "").unwrap();

        assert_eq!(list_fixtures(&layout).unwrap(), vec![4]);
    }

    #[test]
    fn test_list_fixtures_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        assert!(list_fixtures(&layout).unwrap().is_empty());
    }
}
