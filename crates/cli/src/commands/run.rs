//! Run one test script against one VM

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::timelapse::make_timelapse;
use vmtest_common::{Geometry, Keymap, Localization, ScreenOracle, VmInfo};
use vmtest_engine::{Environment, Runner, Script};
use vmtest_quickemu::{QuickEmuProvisioner, Settings};

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Test script to execute
    pub script: PathBuf,

    /// OS to perform the test for
    pub os: String,

    /// OS release to perform the test for
    pub release: String,

    /// OS edition to perform the test for
    pub edition: Option<String>,

    /// Optional variant of the test
    pub variant: Option<String>,

    /// Directory to create VMs in
    #[arg(long, env = "VMTEST_VM_DIR", default_value = "machines")]
    pub machine_dir: PathBuf,

    /// Directory to store logs and screenshots in
    #[arg(long, env = "VMTEST_RESULTS_DIR")]
    pub output_dir: PathBuf,

    /// Language to use for localization
    #[arg(long, env = "VMTEST_LANGUAGE", default_value = "en_US")]
    pub language: String,

    /// Store the last screenshot next to the output directory
    #[arg(
        long,
        env = "VMTEST_SAVE_LAST_SCREENSHOT",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub save_last_screenshot: bool,

    /// Store a timelapse video next to the output directory
    #[arg(
        long,
        env = "VMTEST_SAVE_TIMELAPSE",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub save_timelapse: bool,

    /// Keep intermediate results like screenshots
    #[arg(long, env = "VMTEST_KEEP_RESULTS", value_parser = BoolishValueParser::new())]
    pub keep_results: bool,

    /// Keep the VM data afterwards
    #[arg(long, env = "VMTEST_KEEP_VM", value_parser = BoolishValueParser::new())]
    pub keep_vm: bool,

    /// Also remove the ISO when removing VM data
    #[arg(long, env = "VMTEST_REMOVE_ISO", value_parser = BoolishValueParser::new())]
    pub remove_iso: bool,

    /// Use an existing VM config instead of running quickget
    #[arg(long, env = "VMTEST_SKIP_QUICKGET", value_parser = BoolishValueParser::new())]
    pub skip_quickget: bool,

    /// Screen width in pixels
    #[arg(long, default_value_t = Geometry::default().width)]
    pub width: u32,

    /// Screen height in pixels
    #[arg(long, default_value_t = Geometry::default().height)]
    pub height: u32,
}

impl RunArgs {
    pub fn info(&self) -> VmInfo {
        let mut info = VmInfo::new(&self.os, &self.release);
        if let Some(edition) = self.edition.as_deref().filter(|e| !e.is_empty()) {
            info = info.with_edition(edition);
        }
        if let Some(variant) = self.variant.as_deref().filter(|v| !v.is_empty()) {
            info = info.with_variant(variant);
        }
        info
    }

    /// `<output-dir>.<extension>`
    pub fn sibling(&self, extension: &str) -> PathBuf {
        let mut name = self.output_dir.as_os_str().to_owned();
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    }
}

/// Localization for a script, searched upwards from its directory
pub fn environment(script: &Path, language: &str) -> Result<Environment> {
    let start = script.parent().unwrap_or_else(|| Path::new("."));
    let localization = match Localization::discover(start, language) {
        Some(path) => {
            info!("Using localization {}", path.display());
            Localization::from_file(&path)
                .with_context(|| format!("Invalid localization {}", path.display()))?
        }
        None => {
            warn!("No localization for {}, using defaults", language);
            Localization::default()
        }
    };

    let keymap = match localization.keymap.as_deref() {
        Some(name) => match Keymap::by_name(name) {
            Some(keymap) => keymap,
            None => bail!("Unknown keymap {:?}", name),
        },
        None => Keymap::default(),
    };

    Ok(Environment::new(keymap, localization, ScreenOracle::tesseract()))
}

/// Execute the test; `Ok(false)` when it failed
pub async fn execute(args: RunArgs) -> Result<bool> {
    let script = Script::from_file(&args.script)?;
    info!("{}: {}", args.script.display(), script.description);
    let commands = script.commands()?;

    let env = environment(&args.script, &args.language)?;

    for dir in [&args.machine_dir, &args.output_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let screenshot_dir = std::fs::canonicalize(&args.output_dir)
        .with_context(|| format!("Invalid output directory {}", args.output_dir.display()))?;

    let mut settings = Settings::new(&args.machine_dir, screenshot_dir);
    settings.geometry = Geometry::new(args.width, args.height);
    settings.skip_quickget = args.skip_quickget;

    let mut runner = Runner::new(
        args.info(),
        Box::new(QuickEmuProvisioner::new(settings)),
        env,
        &args.output_dir,
    );

    let outcome = runner.run(commands).await;
    conclude(&args, runner, outcome).await
}

/// Handle the outcome of a run and release the VM on every path
pub async fn conclude(
    args: &RunArgs,
    mut runner: Runner,
    outcome: vmtest_engine::Result<bool>,
) -> Result<bool> {
    let passed = match outcome {
        Ok(passed) => passed,
        Err(e) => {
            if let Err(shutdown) = runner.shutdown().await {
                warn!("Shutdown failed: {}", shutdown);
            }
            return Err(e.into());
        }
    };

    if !passed {
        info!("VM and intermediate results have not been removed");
        runner.shutdown().await?;
        return Ok(false);
    }

    let finished = finish(args, &mut runner).await;
    runner.shutdown().await?;
    finished?;
    Ok(true)
}

/// Store artifacts of a passed test and clean up the VM
async fn finish(args: &RunArgs, runner: &mut Runner) -> Result<()> {
    if args.save_timelapse {
        let dest = args.sibling("mp4");
        info!("Creating timelapse in {}", dest.display());
        if let Err(e) = make_timelapse(&args.output_dir, &dest).await {
            warn!("Timelapse failed: {:#}", e);
        }
    }

    if args.save_last_screenshot {
        let dest = args.sibling("png");
        info!("Storing screenshot to {}", dest.display());
        runner.store_screenshot(&dest).await?;
    }

    if !args.keep_vm {
        info!("Removing VM data");
        if !args.remove_iso {
            info!("Keeping ISO");
        }
        runner.remove_vm(!args.remove_iso).await?;
    }

    runner.store_log(&args.sibling("log"))?;

    if !args.keep_results {
        info!("Removing intermediate results");
        runner.remove_results()?;
    }
    Ok(())
}
