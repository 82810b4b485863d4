//! Regression suite runner.
//!
//! For every selected fixture the stage driver is run, its stdout and stderr
//! are written to the scratch directory and compared with the recorded
//! `{module}/{n}.out` and `{module}/{n}.err`. A fixture passes only when both
//! streams match byte for byte.

use crate::color::{paint, BLUE, GREEN, MAGENTA, RED, YELLOW};
use crate::compile::BuildStatus;
use crate::diff::{render_diff, DiffStyle};
use crate::error::{HarnessError, HarnessResult};
use crate::execute::{Execution, Executor};
use crate::selection::TestSelection;
use chrono::{DateTime, Utc};
use fixtures::{Module, ProjectLayout, Stream};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Verdict for one fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    /// At least one stream differs; diffs are `None` for matching streams
    Failed {
        stdout_diff: Option<String>,
        stderr_diff: Option<String>,
    },
    MissingInput {
        path: PathBuf,
    },
    MissingExpected {
        path: PathBuf,
    },
    TimedOut,
    /// Output matched but Valgrind reported memory errors
    MemoryErrors,
}

impl TestOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseResult {
    pub number: u32,
    pub outcome: TestOutcome,
    pub elapsed: Duration,
}

/// Results for one stage
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub module: Module,
    /// `None` when the build step was skipped
    pub build: Option<BuildStatus>,
    pub results: Vec<CaseResult>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl SuiteReport {
    fn new(module: Module, build: Option<BuildStatus>) -> Self {
        Self {
            module,
            build,
            results: Vec::new(),
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn compiled(&self) -> bool {
        self.build.map_or(true, |status| status.success)
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_pass()).count()
    }

    pub fn failed_numbers(&self) -> Vec<u32> {
        self.results
            .iter()
            .filter(|r| !r.outcome.is_pass())
            .map(|r| r.number)
            .collect()
    }

    pub fn all_passed(&self) -> bool {
        self.compiled() && self.results.iter().all(|r| r.outcome.is_pass())
    }
}

/// Results for a whole invocation
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub suites: Vec<SuiteReport>,
    /// Error that stopped the run before all stages were tested
    pub aborted: Option<String>,
    /// Where the actual outputs were kept, if saved
    pub saved_to: Option<PathBuf>,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.aborted.is_none() && self.suites.iter().all(SuiteReport::all_passed)
    }

    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Options for [`Runner::run_modules`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub selection: TestSelection,
    /// Build each stage with make before testing it
    pub build: bool,
    /// Keep the scratch directory here instead of deleting it
    pub save: Option<PathBuf>,
}

/// Runs fixtures through an [`Executor`] and judges the results
pub struct Runner<E: Executor> {
    layout: ProjectLayout,
    executor: E,
    diff_style: DiffStyle,
    echo: bool,
}

impl<E: Executor> Runner<E> {
    pub fn new(layout: ProjectLayout, executor: E) -> Self {
        Self {
            layout,
            executor,
            diff_style: DiffStyle::Unified,
            echo: true,
        }
    }

    pub fn with_diff_style(mut self, diff_style: DiffStyle) -> Self {
        self.diff_style = diff_style;
        self
    }

    /// Print progress and diffs to stdout (on by default)
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn say(&self, line: &str) {
        if self.echo {
            println!("{line}");
        }
    }

    /// Run and judge one fixture
    pub async fn run_case(&self, module: &Module, number: u32) -> HarnessResult<CaseResult> {
        let input = self.layout.input(number);
        if !input.is_file() {
            return Ok(CaseResult {
                number,
                outcome: TestOutcome::MissingInput { path: input },
                elapsed: Duration::ZERO,
            });
        }

        let execution = self.executor.run(module, number).await?;
        self.record(number, &execution)?;
        let outcome = self.judge(module, number, &execution)?;

        Ok(CaseResult {
            number,
            outcome,
            elapsed: execution.elapsed,
        })
    }

    fn record(&self, number: u32, execution: &Execution) -> HarnessResult<()> {
        fs::create_dir_all(self.layout.scratch_dir())?;
        fs::write(self.layout.actual(number, Stream::Stdout), &execution.stdout)?;
        fs::write(self.layout.actual(number, Stream::Stderr), &execution.stderr)?;
        Ok(())
    }

    fn judge(
        &self,
        module: &Module,
        number: u32,
        execution: &Execution,
    ) -> HarnessResult<TestOutcome> {
        if execution.timed_out {
            return Ok(TestOutcome::TimedOut);
        }

        let mut diffs = [None, None];
        for (slot, stream) in diffs.iter_mut().zip([Stream::Stdout, Stream::Stderr]) {
            let path = self.layout.expected(module, number, stream);
            let expected = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Ok(TestOutcome::MissingExpected { path });
                }
                Err(e) => return Err(e.into()),
            };
            let actual = match stream {
                Stream::Stdout => &execution.stdout,
                Stream::Stderr => &execution.stderr,
            };
            if expected != *actual {
                let ext = stream.extension();
                *slot = Some(
                    render_diff(
                        &format!("{module}/{number}.{ext}"),
                        &format!("temp/{number}.{ext}"),
                        &String::from_utf8_lossy(&expected),
                        &String::from_utf8_lossy(actual),
                        self.diff_style,
                    )
                    .unwrap_or_else(|| "Outputs differ in non-UTF-8 bytes\n".to_string()),
                );
            }
        }

        let [stdout_diff, stderr_diff] = diffs;
        if stdout_diff.is_some() || stderr_diff.is_some() {
            Ok(TestOutcome::Failed {
                stdout_diff,
                stderr_diff,
            })
        } else if execution.memory_errors {
            Ok(TestOutcome::MemoryErrors)
        } else {
            Ok(TestOutcome::Passed)
        }
    }

    /// Run the selected fixtures for one stage, without building it
    pub async fn run_suite(
        &self,
        module: &Module,
        selection: &TestSelection,
    ) -> HarnessResult<SuiteReport> {
        let mut report = SuiteReport::new(module.clone(), None);
        self.run_cases(&mut report, selection).await?;
        Ok(report)
    }

    /// Append results to `report`; on error the cases already run stay in it
    async fn run_cases(
        &self,
        report: &mut SuiteReport,
        selection: &TestSelection,
    ) -> HarnessResult<()> {
        let module = report.module.clone();
        info!("Running {} fixtures for {}", selection.len(), module);
        self.say(&paint(BLUE, &format!("Running tests for {module}...")));

        let start = Instant::now();
        for number in selection.iter() {
            let result = self.run_case(&module, number).await;
            report.elapsed = start.elapsed();
            let result = result?;
            self.print_case(&result);
            report.results.push(result);
        }

        let failed = report.failed_numbers();
        if failed.is_empty() {
            self.say(&paint(GREEN, &format!("All tests passed for {module}!")));
        } else {
            self.say(&paint(RED, &format!("Tests {failed:?} failed for {module}.")));
        }
        Ok(())
    }

    fn print_case(&self, result: &CaseResult) {
        let n = result.number;
        match &result.outcome {
            TestOutcome::Passed => self.say(&paint(GREEN, &format!("Test {n} passed."))),
            TestOutcome::Failed {
                stdout_diff,
                stderr_diff,
            } => {
                for diff in [stdout_diff, stderr_diff].into_iter().flatten() {
                    self.print_diff(diff);
                }
                self.say(&paint(RED, &format!("Test {n} failed.")));
            }
            TestOutcome::MissingInput { path } => self.say(&paint(
                YELLOW,
                &format!("Test {n} failed: no fixture at {}.", path.display()),
            )),
            TestOutcome::MissingExpected { path } => self.say(&paint(
                RED,
                &format!("Test {n} failed: no expected output at {}.", path.display()),
            )),
            TestOutcome::TimedOut => self.say(&paint(RED, &format!("Test {n} timed out."))),
            TestOutcome::MemoryErrors => self.say(&paint(
                MAGENTA,
                &format!("Test {n} failed: Valgrind reported memory errors (see temp/{n}.valgrind)."),
            )),
        }
    }

    fn print_diff(&self, diff: &str) {
        for line in diff.lines() {
            let colored = if line.starts_with("---") || line.starts_with("+++") {
                line.to_string()
            } else if line.starts_with('-') {
                paint(RED, line)
            } else if line.starts_with('+') {
                paint(GREEN, line)
            } else {
                line.to_string()
            };
            self.say(&colored);
        }
    }

    /// Build and test each stage in order.
    ///
    /// The scratch directory is recreated first and, once all stages ran,
    /// either moved to `options.save` or deleted. A stage that fails to
    /// compile is reported and skipped; any other error stops the run.
    pub async fn run_modules(
        &self,
        modules: &[Module],
        options: &RunOptions,
    ) -> HarnessResult<RunReport> {
        self.reset_scratch()?;
        let mut report = RunReport::default();

        for module in modules {
            if let Err(e) = self.run_module(module, options, &mut report.suites).await {
                error!("Stopping run at {}: {}", module, e);
                self.say(&paint(RED, &format!("Error: {e}")));
                report.aborted = Some(e.to_string());
                break;
            }
        }

        report.saved_to = self.finish_scratch(options.save.as_deref())?;
        Ok(report)
    }

    /// Build (if asked) and test one stage, recording its report in `suites`
    /// even when the run stops partway through
    async fn run_module(
        &self,
        module: &Module,
        options: &RunOptions,
        suites: &mut Vec<SuiteReport>,
    ) -> HarnessResult<()> {
        let build = if options.build {
            self.say(&paint(BLUE, &format!("Compiling {module}...")));
            let status = self.executor.build(module).await?;
            if !status.success {
                let code = status
                    .exit_code
                    .map_or_else(|| "none".to_string(), |c| c.to_string());
                self.say(&paint(
                    RED,
                    &format!("{} failed to compile with exit code {code}", module.title()),
                ));
                suites.push(SuiteReport::new(module.clone(), Some(status)));
                return Ok(());
            }
            self.say(&paint(
                GREEN,
                &format!("{} compiled successfully!", module.title()),
            ));
            Some(status)
        } else {
            None
        };

        let mut suite = SuiteReport::new(module.clone(), build);
        let result = self.run_cases(&mut suite, &options.selection).await;
        suites.push(suite);
        result
    }

    fn reset_scratch(&self) -> HarnessResult<()> {
        let scratch = self.layout.scratch_dir();
        if scratch.exists() {
            debug!("Removing stale scratch dir {}", scratch.display());
            fs::remove_dir_all(&scratch)?;
        }
        fs::create_dir_all(&scratch)?;
        Ok(())
    }

    /// Move the scratch dir to `save` (into it, if it is a directory) or
    /// delete it
    fn finish_scratch(&self, save: Option<&Path>) -> HarnessResult<Option<PathBuf>> {
        let scratch = self.layout.scratch_dir();

        let Some(dest) = save else {
            if scratch.exists() {
                fs::remove_dir_all(&scratch)?;
            }
            return Ok(None);
        };

        let target = if dest.is_dir() {
            dest.join("temp")
        } else {
            dest.to_path_buf()
        };
        if target.exists() {
            return Err(HarnessError::SaveFailed {
                path: target,
                reason: "destination already exists".to_string(),
            });
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        if let Err(e) = fs::rename(&scratch, &target) {
            // Cross-device moves cannot be renamed
            debug!("Rename failed ({}), copying scratch dir instead", e);
            copy_dir(&scratch, &target)?;
            fs::remove_dir_all(&scratch)?;
        }

        info!("Saved run outputs to {}", target.display());
        Ok(Some(target))
    }
}

fn copy_dir(from: &Path, to: &Path) -> HarnessResult<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let path = entry.path();
        let dest = to.join(entry.file_name());
        if path.is_dir() {
            copy_dir(&path, &dest)?;
        } else {
            fs::copy(&path, &dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Executor returning canned outputs
    #[derive(Default)]
    struct FakeExecutor {
        outputs: HashMap<u32, Execution>,
        build_ok: bool,
        builds: Mutex<Vec<String>>,
        /// Fixture whose run fails with an I/O error
        broken: Option<u32>,
    }

    impl FakeExecutor {
        fn with_output(mut self, number: u32, stdout: &str, stderr: &str) -> Self {
            self.outputs.insert(
                number,
                Execution {
                    stdout: stdout.as_bytes().to_vec(),
                    stderr: stderr.as_bytes().to_vec(),
                    exit_code: Some(0),
                    ..Default::default()
                },
            );
            self
        }

        fn with_execution(mut self, number: u32, execution: Execution) -> Self {
            self.outputs.insert(number, execution);
            self
        }
    }

    #[async_trait]
    impl Executor for FakeExecutor {
        async fn build(&self, module: &Module) -> HarnessResult<BuildStatus> {
            self.builds.lock().unwrap().push(module.to_string());
            Ok(if self.build_ok {
                BuildStatus::succeeded()
            } else {
                BuildStatus::failed(Some(2))
            })
        }

        async fn run(&self, _module: &Module, number: u32) -> HarnessResult<Execution> {
            if self.broken == Some(number) {
                return Err(std::io::Error::new(ErrorKind::Other, "driver vanished").into());
            }
            Ok(self.outputs.get(&number).cloned().unwrap_or_default())
        }
    }

    fn scanner() -> Module {
        Module::new("scanner").unwrap()
    }

    fn write_fixture(layout: &ProjectLayout, number: u32, out: &str, err: &str) {
        let module = scanner();
        fs::create_dir_all(layout.inputs_dir()).unwrap();
        fs::create_dir_all(layout.expected_dir(&module)).unwrap();
        fs::write(layout.input(number), "program p:").unwrap();
        fs::write(layout.expected(&module, number, Stream::Stdout), out).unwrap();
        fs::write(layout.expected(&module, number, Stream::Stderr), err).unwrap();
    }

    fn runner(layout: &ProjectLayout, executor: FakeExecutor) -> Runner<FakeExecutor> {
        Runner::new(layout.clone(), executor).with_echo(false)
    }

    #[tokio::test]
    async fn test_matching_output_passes() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        write_fixture(&layout, 0, "ID x\n", "");

        let runner = runner(&layout, FakeExecutor::default().with_output(0, "ID x\n", ""));
        let result = runner.run_case(&scanner(), 0).await.unwrap();

        assert_eq!(result.outcome, TestOutcome::Passed);
        assert_eq!(
            fs::read_to_string(layout.actual(0, Stream::Stdout)).unwrap(),
            "ID x\n"
        );
    }

    #[tokio::test]
    async fn test_mismatch_fails_with_diff() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        write_fixture(&layout, 1, "NUM 1\n", "");

        let runner = runner(
            &layout,
            FakeExecutor::default().with_output(1, "NUM 2\n", "error: bad\n"),
        );
        let result = runner.run_case(&scanner(), 1).await.unwrap();

        match result.outcome {
            TestOutcome::Failed {
                stdout_diff,
                stderr_diff,
            } => {
                let stdout_diff = stdout_diff.unwrap();
                assert!(stdout_diff.contains("--- scanner/1.out"));
                assert!(stdout_diff.contains("+NUM 2"));
                assert!(stderr_diff.unwrap().contains("+error: bad"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        let runner = runner(&layout, FakeExecutor::default());

        let result = runner.run_case(&scanner(), 5).await.unwrap();
        assert!(matches!(result.outcome, TestOutcome::MissingInput { .. }));

        fs::create_dir_all(layout.inputs_dir()).unwrap();
        fs::write(layout.input(5), "").unwrap();
        let result = runner.run_case(&scanner(), 5).await.unwrap();
        match result.outcome {
            TestOutcome::MissingExpected { path } => {
                assert_eq!(path, layout.expected(&scanner(), 5, Stream::Stdout));
            }
            other => panic!("expected missing expected output, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_and_memory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        write_fixture(&layout, 2, "", "");
        write_fixture(&layout, 3, "", "");

        let executor = FakeExecutor::default()
            .with_execution(2, Execution::timed_out(Duration::from_secs(10)))
            .with_execution(
                3,
                Execution {
                    memory_errors: true,
                    exit_code: Some(42),
                    ..Default::default()
                },
            );
        let runner = runner(&layout, executor);

        let timed_out = runner.run_case(&scanner(), 2).await.unwrap();
        assert_eq!(timed_out.outcome, TestOutcome::TimedOut);

        let leaky = runner.run_case(&scanner(), 3).await.unwrap();
        assert_eq!(leaky.outcome, TestOutcome::MemoryErrors);
    }

    #[tokio::test]
    async fn test_suite_report_counts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        write_fixture(&layout, 0, "a\n", "");
        write_fixture(&layout, 1, "b\n", "");
        write_fixture(&layout, 2, "c\n", "");

        let executor = FakeExecutor::default()
            .with_output(0, "a\n", "")
            .with_output(1, "wrong\n", "")
            .with_output(2, "c\n", "");
        let runner = runner(&layout, executor);

        let report = runner
            .run_suite(&scanner(), &TestSelection::from_range(0, 2))
            .await
            .unwrap();
        assert_eq!(report.passed(), 2);
        assert_eq!(report.failed_numbers(), vec![1]);
        assert!(!report.all_passed());
        assert!(report.build.is_none());
    }

    #[tokio::test]
    async fn test_run_modules_deletes_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        write_fixture(&layout, 0, "a\n", "");

        let executor = FakeExecutor {
            build_ok: true,
            ..Default::default()
        }
        .with_output(0, "a\n", "");
        let runner = runner(&layout, executor);
        let options = RunOptions {
            selection: TestSelection::from_numbers(vec![0]),
            build: true,
            save: None,
        };

        let report = runner.run_modules(&[scanner()], &options).await.unwrap();
        assert!(report.all_passed());
        assert_eq!(report.suites[0].build, Some(BuildStatus::succeeded()));
        assert_eq!(*runner.executor().builds.lock().unwrap(), vec!["scanner"]);
        assert!(!layout.scratch_dir().exists());
        assert!(report.saved_to.is_none());
    }

    #[tokio::test]
    async fn test_run_modules_saves_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        write_fixture(&layout, 0, "a\n", "");

        let runner = runner(&layout, FakeExecutor::default().with_output(0, "a\n", "w\n"));
        let save = dir.path().join("saved");
        let options = RunOptions {
            selection: TestSelection::from_numbers(vec![0]),
            build: false,
            save: Some(save.clone()),
        };

        let report = runner.run_modules(&[scanner()], &options).await.unwrap();
        assert_eq!(report.saved_to, Some(save.clone()));
        assert_eq!(fs::read_to_string(save.join("0.err")).unwrap(), "w\n");
        assert!(!layout.scratch_dir().exists());

        // A second save into the now-existing directory nests the outputs
        let report = runner.run_modules(&[scanner()], &options).await.unwrap();
        assert_eq!(report.saved_to, Some(save.join("temp")));
    }

    #[tokio::test]
    async fn test_abort_keeps_cases_already_run() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        for n in 0..3 {
            write_fixture(&layout, n, "a\n", "");
        }

        let executor = FakeExecutor {
            broken: Some(2),
            ..Default::default()
        }
        .with_output(0, "a\n", "")
        .with_output(1, "b\n", "");
        let runner = runner(&layout, executor);

        let report = runner
            .run_modules(
                &[scanner(), Module::new("parser").unwrap()],
                &RunOptions {
                    selection: TestSelection::from_range(0, 2),
                    build: false,
                    save: None,
                },
            )
            .await
            .unwrap();

        assert!(report.aborted.as_deref().unwrap().contains("driver vanished"));
        assert_eq!(report.suites.len(), 1);
        let numbers: Vec<u32> = report.suites[0].results.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![0, 1]);
        assert_eq!(report.suites[0].failed_numbers(), vec![1]);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["suites"][0]["results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_compile_failure_skips_tests() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        write_fixture(&layout, 0, "a\n", "");

        let runner = runner(&layout, FakeExecutor::default());
        let options = RunOptions {
            selection: TestSelection::from_numbers(vec![0]),
            build: true,
            save: None,
        };

        let report = runner
            .run_modules(&[scanner(), Module::new("parser").unwrap()], &options)
            .await
            .unwrap();
        assert_eq!(report.suites.len(), 2);
        assert!(!report.suites[0].compiled());
        assert!(report.suites[0].results.is_empty());
        assert!(!report.all_passed());
        assert!(report.aborted.is_none());
    }

    #[test]
    fn test_report_json() {
        let report = RunReport {
            suites: vec![SuiteReport {
                module: scanner(),
                build: None,
                results: vec![CaseResult {
                    number: 4,
                    outcome: TestOutcome::TimedOut,
                    elapsed: Duration::from_secs(10),
                }],
                started_at: Utc::now(),
                elapsed: Duration::from_secs(10),
            }],
            aborted: None,
            saved_to: None,
        };

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["suites"][0]["module"], "scanner");
        assert_eq!(json["suites"][0]["results"][0]["outcome"]["status"], "timed_out");
    }
}
