//! Monitor client
//!
//! Speaks the human monitor protocol over a Unix socket: one
//! newline-terminated ASCII command per line. Commands are fire-and-forget,
//! nothing is read back.

use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::{Error, Result};

/// Monitor client for a single VM
pub struct Monitor {
    socket_path: String,
    stream: Mutex<Option<UnixStream>>,
}

impl Monitor {
    /// Connect to the monitor socket
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            Error::Monitor(format!(
                "Failed to connect to {}: {}",
                socket_path.display(),
                e
            ))
        })?;

        debug!("Connected to monitor socket: {}", socket_path.display());
        Ok(Self::from_stream(
            socket_path.to_string_lossy().to_string(),
            stream,
        ))
    }

    /// Wrap an already connected stream
    pub fn from_stream(socket_path: impl Into<String>, stream: UnixStream) -> Self {
        Self {
            socket_path: socket_path.into(),
            stream: Mutex::new(Some(stream)),
        }
    }

    /// Check if connected
    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    /// Send one command line made of space-separated arguments
    pub async fn execute(&self, args: &[&str]) -> Result<()> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| Error::Monitor("Not connected".to_string()))?;

        let line = args.join(" ");
        debug!("Monitor command: {}", line);

        stream
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| Error::Monitor(format!("Failed to send {:?}: {}", line, e)))?;
        stream
            .flush()
            .await
            .map_err(|e| Error::Monitor(format!("Failed to flush {:?}: {}", line, e)))?;

        Ok(())
    }

    pub async fn system_reset(&self) -> Result<()> {
        self.execute(&["system_reset"]).await
    }

    pub async fn system_powerdown(&self) -> Result<()> {
        self.execute(&["system_powerdown"]).await
    }

    /// Ask the hypervisor to write the display contents to `path`
    pub async fn screendump(&self, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.execute(&["screendump", &*path]).await
    }

    pub async fn send_key(&self, combo: &str) -> Result<()> {
        self.execute(&["sendkey", combo]).await
    }

    pub async fn eject(&self, device: &str, force: bool) -> Result<()> {
        if force {
            self.execute(&["eject", "-f", device]).await
        } else {
            self.execute(&["eject", device]).await
        }
    }

    /// Close the connection
    pub async fn close(&self) {
        let mut guard = self.stream.lock().await;
        if let Some(mut stream) = guard.take() {
            let _ = stream.shutdown().await;
            trace!("Closed monitor socket: {}", self.socket_path);
        }
    }
}

/// Wait until the monitor socket appears and accepts a connection
pub async fn wait_for_monitor(socket_path: &Path, timeout_secs: u64) -> Result<Monitor> {
    let start = Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Timeout {
                seconds: timeout_secs,
            });
        }

        if socket_path.exists() {
            match Monitor::connect(socket_path).await {
                Ok(monitor) => return Ok(monitor),
                Err(e) => {
                    trace!("Monitor not ready: {}", e);
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn pair() -> (Monitor, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        (Monitor::from_stream("test.socket", ours), theirs)
    }

    async fn received(monitor: Monitor, mut peer: UnixStream) -> String {
        monitor.close().await;
        let mut out = String::new();
        peer.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_commands_are_newline_terminated() {
        let (monitor, peer) = pair().await;

        monitor.system_reset().await.unwrap();
        monitor.send_key("shift-a").await.unwrap();
        monitor.screendump(Path::new("/tmp/out/screenshot_0000.ppm")).await.unwrap();
        monitor.eject("ide0-cd0", true).await.unwrap();
        monitor.eject("ide1-cd0", false).await.unwrap();
        monitor.system_powerdown().await.unwrap();

        assert_eq!(
            received(monitor, peer).await,
            "system_reset\n\
             sendkey shift-a\n\
             screendump /tmp/out/screenshot_0000.ppm\n\
             eject -f ide0-cd0\n\
             eject ide1-cd0\n\
             system_powerdown\n"
        );
    }

    #[tokio::test]
    async fn test_execute_after_close_is_fatal() {
        let (monitor, _peer) = pair().await;
        monitor.close().await;

        assert!(!monitor.is_connected().await);
        let err = monitor.send_key("ret").await.unwrap_err();
        assert!(matches!(err, Error::Monitor(_)));
    }

    #[tokio::test]
    async fn test_wait_for_monitor_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let err = wait_for_monitor(&dir.path().join("missing.socket"), 0)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Timeout { seconds: 0 }));
    }
}
