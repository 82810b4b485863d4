use crate::error::{HarnessError, HarnessResult};
use crate::selection::TestSelection;
use fixtures::Module;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name of the optional config file at the project root
pub const CONFIG_FILE: &str = "ampltest.toml";

/// Harness settings, read from `ampltest.toml` and overridden by CLI flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Stages run by `all`, in order
    pub modules: Vec<Module>,
    /// Per-fixture driver timeout in seconds
    pub timeout_secs: u64,
    /// First fixture run when no tests are given
    pub default_first: u32,
    /// Last fixture (inclusive) run when no tests are given
    pub default_last: u32,
    /// Run `make` before testing a stage
    pub build: bool,
    /// Run drivers under Valgrind
    pub valgrind: bool,
    /// Exit code Valgrind uses to report memory errors
    pub valgrind_error_exitcode: i32,
    /// Render diffs in two columns
    pub side_by_side: bool,
    /// Width of each side-by-side column
    pub side_by_side_width: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            modules: ["scanner", "hashtable", "symboltable"]
                .into_iter()
                .filter_map(|name| Module::new(name).ok())
                .collect(),
            timeout_secs: 10,
            default_first: 0,
            default_last: 10,
            build: true,
            valgrind: false,
            valgrind_error_exitcode: 42,
            side_by_side: false,
            side_by_side_width: 60,
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a config file
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text).map_err(|source| HarnessError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(HarnessError::InvalidConfig)?;
        Ok(config)
    }

    /// Load `ampltest.toml` from `root`, or defaults when it is absent
    pub fn discover(root: &Path) -> HarnessResult<Self> {
        let path = root.join(CONFIG_FILE);
        if path.is_file() {
            tracing::debug!("Loading config from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn with_modules(mut self, modules: Vec<Module>) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_build(mut self, build: bool) -> Self {
        self.build = build;
        self
    }

    pub fn with_valgrind(mut self, valgrind: bool) -> Self {
        self.valgrind = valgrind;
        self
    }

    pub fn with_side_by_side(mut self, side_by_side: bool) -> Self {
        self.side_by_side = side_by_side;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fixtures run when none are named on the command line
    pub fn default_selection(&self) -> TestSelection {
        TestSelection::from_range(self.default_first, self.default_last)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.modules.is_empty() {
            return Err("At least one module must be configured".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.default_first > self.default_last {
            return Err(format!(
                "Default test range {}..{} is empty",
                self.default_first, self.default_last
            ));
        }

        if !(1..=255).contains(&self.valgrind_error_exitcode) {
            return Err("Valgrind error exit code must be between 1 and 255".to_string());
        }

        if self.side_by_side_width < 10 {
            return Err("Side-by-side column width must be at least 10".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        let names: Vec<&str> = config.modules.iter().map(|m| m.as_str()).collect();
        assert_eq!(names, vec!["scanner", "hashtable", "symboltable"]);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.default_selection().len(), 11);
        assert!(config.build);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = HarnessConfig::new()
            .with_modules(vec![Module::new("parser").unwrap()])
            .with_timeout(Duration::from_secs(3))
            .with_build(false)
            .with_valgrind(true)
            .with_side_by_side(true);

        assert_eq!(config.modules, vec![Module::new("parser").unwrap()]);
        assert_eq!(config.timeout_secs, 3);
        assert!(!config.build);
        assert!(config.valgrind);
        assert!(config.side_by_side);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = HarnessConfig::default();

        config.modules.clear();
        assert!(config.validate().is_err());

        config = HarnessConfig::default();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());

        config = HarnessConfig::default();
        config.default_first = 5;
        config.default_last = 4;
        assert!(config.validate().is_err());

        config = HarnessConfig::default();
        config.valgrind_error_exitcode = 0;
        assert!(config.validate().is_err());

        config = HarnessConfig::default();
        config.side_by_side_width = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "modules = [\"scanner\", \"parser\"]\ntimeout_secs = 2\n",
        )
        .unwrap();

        let config = HarnessConfig::discover(dir.path()).unwrap();
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.modules[1].as_str(), "parser");
        assert_eq!(config.timeout_secs, 2);
        assert_eq!(config.default_last, 10);
    }

    #[test]
    fn test_load_rejects_bad_module_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "modules = [\"Scanner!\"]\n").unwrap();

        let result = HarnessConfig::load(&path);
        assert!(matches!(result, Err(HarnessError::ConfigParse { .. })));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "timeout_secs = 0\n").unwrap();

        let result = HarnessConfig::load(&path);
        assert!(matches!(result, Err(HarnessError::InvalidConfig(_))));
    }

    #[test]
    fn test_discover_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::discover(dir.path()).unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_serialization() {
        let config = HarnessConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: HarnessConfig = toml::from_str(&text).unwrap();
        assert_eq!(config, parsed);
    }
}
