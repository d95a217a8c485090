//! Run a single named test

use anyhow::Result;
use chrono::Local;
use clap::Parser;

use super::{run_child, ChildOptions};
use crate::output::print_result;
use crate::suite::Test;

#[derive(Parser, Debug, Clone)]
pub struct TestArgs {
    /// Name of the test to run
    pub name: String,

    /// OS to perform the test for
    pub os: String,

    /// OS release to perform the test for
    pub release: String,

    /// OS edition to perform the test for
    pub edition: Option<String>,

    #[command(flatten)]
    pub options: ChildOptions,
}

impl TestArgs {
    pub fn test(&self) -> Test {
        Test::new(&self.name, &self.os, &self.release, self.edition.as_deref())
            .with_timestamp(Local::now())
    }
}

pub async fn execute(args: TestArgs, debug: bool) -> Result<bool> {
    let test = args.test();
    let passed = run_child(&test, &args.options, &args.options.output_dir, debug).await?;
    print_result(passed, &test.to_string());
    Ok(passed)
}
