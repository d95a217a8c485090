//! Pid files and external tools

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn, Level};

use vmtest_common::{Error, Result};

/// Read the pid stored in `file`, if any
pub fn read_pid(file: &Path) -> Option<Pid> {
    let content = std::fs::read_to_string(file).ok()?;
    content.trim().parse::<i32>().ok().map(Pid::from_raw)
}

/// Whether a process with this pid exists
pub fn is_alive(pid: Pid) -> bool {
    kill(pid, None).is_ok()
}

/// Whether `file` names a live process
pub fn pid_file_alive(file: &Path) -> bool {
    read_pid(file).map(is_alive).unwrap_or(false)
}

/// Send SIGTERM without waiting
pub fn signal_terminate(pid: Pid) {
    debug!("Sending SIGTERM to VM PID {}", pid);
    let _ = kill(pid, Signal::SIGTERM);
}

/// How long a VM gets to exit after SIGTERM before it is killed
pub const TERMINATE_GRACE: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Send SIGTERM and wait until the process is gone, escalating to SIGKILL
/// once `grace` has passed
pub async fn terminate(pid: Pid, grace: Duration) {
    signal_terminate(pid);

    let deadline = Instant::now() + grace;
    while is_alive(pid) {
        if Instant::now() >= deadline {
            warn!("VM PID {} did not exit, sending SIGKILL", pid);
            let _ = kill(pid, Signal::SIGKILL);
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// SIGTERMs the process named by a pid file when dropped, unless disarmed.
///
/// Held while a freshly launched VM is not yet owned by a handle.
pub struct PidGuard {
    pid_file: PathBuf,
    armed: bool,
}

impl PidGuard {
    pub fn new(pid_file: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: pid_file.into(),
            armed: true,
        }
    }

    /// Hand responsibility for the process to someone else
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(pid) = read_pid(&self.pid_file) {
            warn!("Stopping VM PID {} that was never handed over", pid);
            signal_terminate(pid);
        }
    }
}

/// Tool output is shown only when debug logging is on
fn tool_output() -> Stdio {
    if tracing::enabled!(Level::DEBUG) {
        Stdio::inherit()
    } else {
        Stdio::null()
    }
}

/// Run an external tool in `dir` and wait for it to succeed
pub async fn run_tool(program: &str, args: &[String], dir: &Path) -> Result<()> {
    debug!("Running {} {}", program, args.join(" "));

    let status = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(tool_output())
        .stderr(tool_output())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| Error::Provision(format!("Failed to run {}: {}", program, e)))?;

    if !status.success() {
        return Err(Error::Provision(format!("{} exited with {}", program, status)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_own_pid_is_alive() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vm.pid");
        std::fs::write(&file, format!("{}\n", std::process::id())).unwrap();

        assert_eq!(
            read_pid(&file),
            Some(Pid::from_raw(std::process::id() as i32))
        );
        assert!(pid_file_alive(&file));
    }

    #[test]
    fn test_missing_or_garbage_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vm.pid");
        assert!(!pid_file_alive(&file));

        std::fs::write(&file, "not a pid").unwrap();
        assert_eq!(read_pid(&file), None);
        assert!(!pid_file_alive(&file));
    }

    #[tokio::test]
    async fn test_run_tool_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        run_tool("true", &[], dir.path()).await.unwrap();

        let err = run_tool("false", &[], dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Provision(_)));

        let err = run_tool("vmtest-no-such-tool", &[], dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to run"));
    }

    #[tokio::test]
    async fn test_terminate_escalates_to_sigkill() {
        let mut child = std::process::Command::new("sh")
            .args(["-c", "trap '' TERM; while true; do sleep 1; done"])
            .spawn()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let pid = Pid::from_raw(child.id() as i32);
        terminate(pid, Duration::from_millis(300)).await;

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGKILL as i32));
    }

    #[tokio::test]
    async fn test_terminate_returns_once_process_exits() {
        let mut child = std::process::Command::new("sleep").arg("1000").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);

        let reaper = std::thread::spawn(move || child.wait().unwrap());
        terminate(pid, TERMINATE_GRACE).await;

        let status = reaper.join().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    }

    #[test]
    fn test_pid_guard() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("vm.pid");

        let mut child = std::process::Command::new("sleep").arg("1000").spawn().unwrap();
        std::fs::write(&file, child.id().to_string()).unwrap();
        PidGuard::new(&file).disarm();
        assert!(pid_file_alive(&file));

        drop(PidGuard::new(&file));
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    }
}
