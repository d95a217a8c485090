//! vmtest CLI - Main Entry Point

use clap::{Parser, Subcommand};

use vmtest_cli::commands::{list, run, suite, test};
use vmtest_cli::logging;
use vmtest_cli::output::print_error;

/// Unattended OS installation and boot tests
#[derive(Parser)]
#[command(name = "vmtest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a test script against a VM
    Run(run::RunArgs),

    /// List available test cases
    List(list::ListArgs),

    /// Run a single test case by name
    Test(test::TestArgs),

    /// Run all tests of a suite file
    Suite(suite::SuiteArgs),
}

/// Run the selected command; `Ok(false)` when a test failed
async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run(args) => {
            logging::init(Some(&args.output_dir), cli.debug)?;
            run::execute(args).await
        }
        Commands::List(args) => {
            logging::init(None, cli.debug)?;
            list::execute(args).map(|_| true)
        }
        Commands::Test(args) => {
            logging::init(None, cli.debug)?;
            test::execute(args, cli.debug).await
        }
        Commands::Suite(args) => {
            let suite = suite::SuiteRun::new(args)?;
            logging::init(Some(suite.output()), cli.debug)?;
            suite.execute(cli.debug).await
        }
    }
}

/// 0 on success, 1 when a test failed, 2 on any error
fn exit_code(result: &anyhow::Result<bool>) -> i32 {
    match result {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(_) => 2,
    }
}

#[tokio::main]
async fn main() {
    let result = dispatch(Cli::parse()).await;
    if let Err(e) = &result {
        print_error(&format!("{:#}", e));
    }
    std::process::exit(exit_code(&result));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreadable_suite_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("missing.yaml").to_string_lossy().to_string();
        let output = dir.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from([
            "vmtest",
            "suite",
            file.as_str(),
            "--output-dir",
            output.as_str(),
        ])
        .unwrap();

        let result = dispatch(cli).await;
        assert!(result.is_err());
        assert_eq!(exit_code(&result), 2);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok(true)), 0);
        assert_eq!(exit_code(&Ok(false)), 1);
    }
}
