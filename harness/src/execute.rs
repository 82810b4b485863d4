//! Running stage drivers against fixtures.
//!
//! The runner talks to the outside world only through [`Executor`], so the
//! suite logic can be tested with canned outputs. [`ProcessExecutor`] is the
//! real implementation: it runs `make` and `bin/test{module} tests/{n}.ampl`.

use crate::compile::{compile_module, BuildStatus};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use async_trait::async_trait;
use fixtures::{Module, ProjectLayout};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Captured result of one driver run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when killed by a signal or by the timeout
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Valgrind reported invalid accesses or leaks
    pub memory_errors: bool,
    pub elapsed: Duration,
}

impl Execution {
    pub fn timed_out(elapsed: Duration) -> Self {
        Self {
            timed_out: true,
            elapsed,
            ..Default::default()
        }
    }
}

/// Builds and runs stage drivers
#[async_trait]
pub trait Executor: Send + Sync {
    /// Build the driver for `module`
    async fn build(&self, module: &Module) -> HarnessResult<BuildStatus>;

    /// Run the driver for `module` on fixture `number`
    async fn run(&self, module: &Module, number: u32) -> HarnessResult<Execution>;
}

/// Valgrind settings for memory checking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValgrindOptions {
    /// Exit code Valgrind uses when it finds errors
    pub error_exitcode: i32,
    /// Directory for per-fixture Valgrind logs
    pub log_dir: PathBuf,
}

/// Executor spawning real processes
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    layout: ProjectLayout,
    timeout: Duration,
    valgrind: Option<ValgrindOptions>,
}

impl ProcessExecutor {
    pub fn new(layout: ProjectLayout) -> Self {
        Self {
            layout,
            timeout: Duration::from_secs(10),
            valgrind: None,
        }
    }

    /// Executor with the configured timeout, logging Valgrind reports to
    /// the scratch directory when Valgrind is enabled
    pub fn from_config(layout: ProjectLayout, config: &HarnessConfig) -> Self {
        let valgrind = config.valgrind.then(|| ValgrindOptions {
            error_exitcode: config.valgrind_error_exitcode,
            log_dir: layout.scratch_dir(),
        });
        Self::new(layout)
            .with_timeout(config.timeout())
            .with_valgrind(valgrind)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_valgrind(mut self, valgrind: Option<ValgrindOptions>) -> Self {
        self.valgrind = valgrind;
        self
    }

    pub fn uses_valgrind(&self) -> bool {
        self.valgrind.is_some()
    }

    fn command(&self, module: &Module, number: u32) -> Command {
        let driver = self.layout.driver(module);
        let mut cmd = match &self.valgrind {
            Some(options) => {
                let mut cmd = Command::new("valgrind");
                cmd.arg("--leak-check=full")
                    .arg(format!("--error-exitcode={}", options.error_exitcode))
                    .arg(format!(
                        "--log-file={}",
                        options.log_dir.join(format!("{number}.valgrind")).display()
                    ))
                    .arg(driver);
                cmd
            }
            None => Command::new(driver),
        };

        cmd.arg(self.layout.input_arg(number))
            .current_dir(self.layout.test_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn build(&self, module: &Module) -> HarnessResult<BuildStatus> {
        compile_module(&self.layout, module).await
    }

    async fn run(&self, module: &Module, number: u32) -> HarnessResult<Execution> {
        let program = if self.valgrind.is_some() {
            "valgrind".to_string()
        } else {
            self.layout.driver(module).display().to_string()
        };
        debug!("Running {} on fixture {}", program, number);

        let start = Instant::now();
        let child = self
            .command(module, number)
            .spawn()
            .map_err(|source| HarnessError::Spawn { program, source })?;

        // Dropping the pending future drops the child, which kills it.
        match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let exit_code = output.status.code();
                let memory_errors = self
                    .valgrind
                    .as_ref()
                    .is_some_and(|options| exit_code == Some(options.error_exitcode));
                Ok(Execution {
                    stdout: output.stdout,
                    stderr: output.stderr,
                    exit_code,
                    timed_out: false,
                    memory_errors,
                    elapsed: start.elapsed(),
                })
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(
                    "{} timed out on fixture {} after {:?}",
                    module, number, self.timeout
                );
                Ok(Execution::timed_out(start.elapsed()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn install_driver(layout: &ProjectLayout, module: &Module, script: &str) {
        fs::create_dir_all(layout.bin_dir()).unwrap();
        fs::create_dir_all(layout.inputs_dir()).unwrap();
        let path = layout.driver(module);
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_run_captures_streams() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let module = Module::new("scanner").unwrap();
        install_driver(
            &layout,
            &module,
            "#!/bin/sh\necho \"reading $1\"\necho \"oops\" >&2\nexit 3\n",
        );

        let executor = ProcessExecutor::new(layout.clone());
        let execution = executor.run(&module, 4).await.unwrap();

        assert_eq!(execution.stdout, b"reading tests/4.ampl\n");
        assert_eq!(execution.stderr, b"oops\n");
        assert_eq!(execution.exit_code, Some(3));
        assert!(!execution.timed_out);
        assert!(!execution.memory_errors);
    }

    #[tokio::test]
    #[serial]
    async fn test_run_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let module = Module::new("scanner").unwrap();
        install_driver(&layout, &module, "#!/bin/sh\nsleep 5\n");

        let executor =
            ProcessExecutor::new(layout.clone()).with_timeout(Duration::from_millis(200));
        let execution = executor.run(&module, 0).await.unwrap();

        assert!(execution.timed_out);
        assert!(execution.elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_driver_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        fs::create_dir_all(layout.test_dir()).unwrap();
        let module = Module::new("parser").unwrap();

        let result = ProcessExecutor::new(layout).run(&module, 0).await;
        assert!(matches!(result, Err(HarnessError::Spawn { .. })));
    }

    #[test]
    fn test_from_config() {
        let layout = ProjectLayout::new("/project");
        let config = HarnessConfig::default()
            .with_timeout(Duration::from_secs(3))
            .with_valgrind(true);

        let executor = ProcessExecutor::from_config(layout, &config);
        assert!(executor.uses_valgrind());
        assert_eq!(executor.timeout, Duration::from_secs(3));
        assert_eq!(
            executor.valgrind.as_ref().map(|v| v.log_dir.clone()),
            Some(PathBuf::from("/project/test/temp"))
        );
    }

    #[test]
    fn test_valgrind_command_line() {
        let layout = ProjectLayout::new("/project");
        let module = Module::new("scanner").unwrap();
        let executor = ProcessExecutor::new(layout).with_valgrind(Some(ValgrindOptions {
            error_exitcode: 42,
            log_dir: PathBuf::from("/project/test/temp"),
        }));

        let cmd = executor.command(&module, 7);
        let std_cmd = cmd.as_std();
        let args: Vec<String> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(std_cmd.get_program(), "valgrind");
        assert_eq!(
            args,
            vec![
                "--leak-check=full",
                "--error-exitcode=42",
                "--log-file=/project/test/temp/7.valgrind",
                "/project/bin/testscanner",
                "tests/7.ampl",
            ]
        );
    }
}
