//! Recording the current driver output as the expected output.

use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::execute::{Executor, ProcessExecutor};
use crate::selection::TestSelection;
use fixtures::{Module, ProjectLayout, Stream};
use serde::Serialize;
use std::fs;
use tracing::{info, warn};

/// Fixtures whose expected outputs were (re)written, and the ones skipped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlessReport {
    pub blessed: Vec<u32>,
    pub skipped: Vec<SkippedFixture>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFixture {
    pub number: u32,
    pub reason: String,
}

/// Executor for recording expected outputs.
///
/// Drivers are never wrapped in Valgrind here: expected files hold the plain
/// driver output, and no scratch directory exists for Valgrind logs.
pub fn bless_executor(layout: ProjectLayout, config: &HarnessConfig) -> ProcessExecutor {
    ProcessExecutor::from_config(layout, &config.clone().with_valgrind(false))
}

/// Run each selected fixture and store its stdout and stderr as
/// `test/{module}/{n}.out` and `test/{module}/{n}.err`.
///
/// Missing fixtures and runs that time out are skipped, leaving any existing
/// expected files untouched.
pub async fn bless<E: Executor>(
    layout: &ProjectLayout,
    executor: &E,
    module: &Module,
    selection: &TestSelection,
) -> HarnessResult<BlessReport> {
    fs::create_dir_all(layout.expected_dir(module))?;
    let mut report = BlessReport::default();

    for number in selection.iter() {
        if !layout.input(number).is_file() {
            report.skipped.push(SkippedFixture {
                number,
                reason: "no fixture".to_string(),
            });
            continue;
        }

        let execution = executor.run(module, number).await?;
        if execution.timed_out {
            warn!("Not blessing {} fixture {}: timed out", module, number);
            report.skipped.push(SkippedFixture {
                number,
                reason: "timed out".to_string(),
            });
            continue;
        }

        fs::write(layout.expected(module, number, Stream::Stdout), &execution.stdout)?;
        fs::write(layout.expected(module, number, Stream::Stderr), &execution.stderr)?;
        report.blessed.push(number);
    }

    info!(
        "Blessed {} fixtures for {} ({} skipped)",
        report.blessed.len(),
        module,
        report.skipped.len()
    );
    Ok(report)
}
