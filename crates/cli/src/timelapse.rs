//! Timelapse video of a test's screenshots

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, Level};

/// Seconds each screenshot stays on screen
pub const SECONDS_PER_FRAME: u32 = 3;

/// ffmpeg arguments turning `<src>/screenshot_*.png` into `dest`
pub fn ffmpeg_args(src: &Path, dest: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-nostdin",
        "-hide_banner",
        "-loglevel",
        "error",
        "-framerate",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(format!("1/{}", SECONDS_PER_FRAME));
    args.extend(["-pattern_type", "glob", "-i"].map(String::from));
    args.push(src.join("screenshot_*.png").to_string_lossy().to_string());
    args.extend(["-c:v", "libx264", "-pix_fmt", "yuv420p"].map(String::from));
    args.push(dest.to_string_lossy().to_string());
    args
}

/// Render the timelapse with ffmpeg
pub async fn make_timelapse(src: &Path, dest: &Path) -> Result<()> {
    let args = ffmpeg_args(src, dest);
    debug!("Running ffmpeg {}", args.join(" "));

    let output = if tracing::enabled!(Level::DEBUG) {
        Stdio::inherit
    } else {
        Stdio::null
    };

    let status = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(output())
        .stderr(output())
        .status()
        .await
        .context("Failed to run ffmpeg")?;

    if !status.success() {
        bail!("ffmpeg exited with {}", status);
    }
    Ok(())
}
