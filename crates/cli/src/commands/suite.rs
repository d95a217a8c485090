//! Run a test suite

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use super::{run_child, ChildOptions};
use crate::output::{print_result, result_icon};
use crate::report::{format_duration, Artifacts, Report};
use crate::suite::{SuiteFile, TIMESTAMP_FORMAT};

#[derive(Parser, Debug, Clone)]
pub struct SuiteArgs {
    /// Suite file to run
    pub file: PathBuf,

    #[command(flatten)]
    pub options: ChildOptions,
}

/// A suite prepared for execution
pub struct SuiteRun {
    name: String,
    file: SuiteFile,
    options: ChildOptions,
    started: DateTime<Local>,
    output: PathBuf,
}

impl SuiteRun {
    /// Load the suite file and pick `<output>/<suite>/<timestamp>` for results
    pub fn new(args: SuiteArgs) -> Result<Self> {
        let file = SuiteFile::from_file(&args.file)?;
        let name = args
            .file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .context("Suite file has no name")?;

        let started = Local::now();
        let output = args
            .options
            .output_dir
            .join(&name)
            .join(started.format(TIMESTAMP_FORMAT).to_string());
        std::fs::create_dir_all(&output)
            .with_context(|| format!("Failed to create {}", output.display()))?;

        Ok(Self {
            name,
            file,
            options: args.options,
            started,
            output,
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Run every test in order; returns whether all passed
    pub async fn execute(self, debug: bool) -> Result<bool> {
        let tests = self.file.tests()?;
        let artifacts = Artifacts {
            screenshot: self.file.flag("VMTEST_SAVE_LAST_SCREENSHOT", true),
            timelapse: self.file.flag("VMTEST_SAVE_TIMELAPSE", true),
        };

        let report = Report::create(
            &self.output,
            &self.name,
            self.started,
            artifacts,
            self.file.default.env.clone(),
        )?;
        let index = std::fs::canonicalize(report.path())?;
        info!("Test suite overview: file://{}", index.display());

        let mut all_passed = true;
        for test in &tests {
            info!("▶️  {}", test);
            let start = Instant::now();
            let passed = run_child(test, &self.options, &self.output, debug).await?;
            let duration = start.elapsed();

            info!("{} {}", result_icon(passed), test);
            info!("⏱️  Test took {}", format_duration(duration));
            print_result(passed, &test.to_string());

            report.add(test, passed, duration)?;
            all_passed &= passed;
        }

        report.finish()?;
        info!(
            "Suite completed. Results are stored in file://{}",
            std::fs::canonicalize(&self.output)?.display()
        );
        info!("Test suite overview: file://{}", index.display());
        Ok(all_passed)
    }
}
