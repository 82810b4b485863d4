use crate::error::{HarnessError, HarnessResult};
use fixtures::{Module, ProjectLayout};
use serde::Serialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Result of building a stage driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildStatus {
    pub success: bool,
    pub exit_code: Option<i32>,
}

impl BuildStatus {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
        }
    }

    pub fn failed(exit_code: Option<i32>) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Build `bin/test{module}` from scratch.
///
/// Runs `make clean` followed by `make test{module}` in `src/`. Make's
/// stdout is discarded, stderr is left attached so compiler diagnostics
/// reach the console.
pub async fn compile_module(layout: &ProjectLayout, module: &Module) -> HarnessResult<BuildStatus> {
    let src = layout.src_dir();

    let clean = run_make(&src, "clean").await?;
    if !clean.success() {
        warn!("`make clean` in {} exited with {:?}", src.display(), clean.code());
    }

    let target = module.make_target();
    let status = run_make(&src, &target).await?;
    debug!("`make {}` exited with {:?}", target, status.code());

    if status.success() {
        Ok(BuildStatus::succeeded())
    } else {
        Ok(BuildStatus::failed(status.code()))
    }
}

async fn run_make(dir: &std::path::Path, target: &str) -> HarnessResult<std::process::ExitStatus> {
    Command::new("make")
        .arg(target)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .status()
        .await
        .map_err(|source| HarnessError::Spawn {
            program: format!("make {target}"),
            source,
        })
}
