//! Regression test harness for the AMPL compiler stages.
//!
//! A stage driver (`bin/test{module}`) is built with make, run on numbered
//! fixtures (`test/tests/{n}.ampl`) and its output compared with the recorded
//! expected output (`test/{module}/{n}.out` and `.err`).

pub mod bless;
pub mod color;
pub mod compile;
pub mod config;
pub mod diff;
pub mod error;
pub mod error_log;
pub mod execute;
pub mod runner;
pub mod selection;

pub use bless::{bless, bless_executor, BlessReport, SkippedFixture};
pub use compile::{compile_module, BuildStatus};
pub use config::{HarnessConfig, CONFIG_FILE};
pub use diff::{render_diff, DiffStyle};
pub use error::{HarnessError, HarnessResult};
pub use error_log::{extract_errors, ErrorLine};
pub use execute::{Execution, Executor, ProcessExecutor, ValgrindOptions};
pub use runner::{CaseResult, RunOptions, RunReport, Runner, SuiteReport, TestOutcome};
pub use selection::{parse_modules, TestSelection};
