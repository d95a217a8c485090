//! List available test cases

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::output::{print_list, OutputFormat};
use crate::testcase::discover;

#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Directory containing test cases
    #[arg(short, long, default_value = "testcases")]
    pub testcase_dir: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub fn execute(args: ListArgs) -> Result<()> {
    if !args.testcase_dir.is_dir() {
        bail!("{} is not a directory", args.testcase_dir.display());
    }

    print_list(&discover(&args.testcase_dir), args.format);
    Ok(())
}
