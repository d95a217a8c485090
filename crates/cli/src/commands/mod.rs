//! CLI Commands

pub mod list;
pub mod run;
pub mod suite;
pub mod test;

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::logging::LOG_LEVEL_ENV;
use crate::suite::Test;

/// Options shared by commands that execute tests in child processes
#[derive(Args, Debug, Clone)]
pub struct ChildOptions {
    /// Directory containing test cases
    #[arg(short, long, default_value = "testcases")]
    pub testcase_dir: PathBuf,

    /// Directory to store test output in
    #[arg(short, long, default_value = "results")]
    pub output_dir: PathBuf,

    /// Directory to store VMs in
    #[arg(short, long, env = "VMTEST_VM_DIR", default_value = "machines")]
    pub machine_dir: PathBuf,

    /// Show what would be executed instead of running it
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute a test with `vmtest run` in a child process; `Ok(true)` if it passed
pub async fn run_child(
    test: &Test,
    options: &ChildOptions,
    output_root: &Path,
    debug: bool,
) -> Result<bool> {
    let args = test.run_args(&options.testcase_dir, output_root)?;
    let env = test.resolved_env();

    if options.dry_run {
        info!("Would execute {:?}, env: {:?}", args.join(" "), env);
        return Ok(true);
    }

    let exe = std::env::current_exe().context("Cannot locate the vmtest executable")?;
    debug!("Executing {} {}", exe.display(), args.join(" "));

    let mut command = Command::new(exe);
    command
        .args(&args)
        .envs(&env)
        .env("VMTEST_VM_DIR", &options.machine_dir);
    if debug {
        command.env(LOG_LEVEL_ENV, "debug");
    }

    let status = command
        .status()
        .await
        .with_context(|| format!("Failed to run {}", test))?;
    Ok(status.success())
}
