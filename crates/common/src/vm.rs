//! VM control interface
//!
//! [`Vm`] is the narrow set of operations a command may invoke against a
//! running guest. [`MonitorVm`] implements it on top of a [`Monitor`]
//! connection; provisioners wrap it with process management.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::monitor::Monitor;
use crate::types::VmInfo;
use crate::Result;

/// Operations available on a live VM.
///
/// Every error returned here is fatal: it means the control channel or the
/// VM process is gone.
#[async_trait]
pub trait Vm: Send + Sync {
    fn info(&self) -> &VmInfo;

    async fn reset(&self) -> Result<()>;

    async fn power_off(&self) -> Result<()>;

    /// Request a screenshot named `name` in the VM's screenshot directory.
    ///
    /// The returned file may not exist yet when this returns; the
    /// hypervisor writes it asynchronously.
    async fn screenshot(&self, name: &str) -> Result<PathBuf>;

    async fn send_key(&self, combo: &str) -> Result<()>;

    async fn eject(&self, device: &str, force: bool) -> Result<()>;

    /// Remove the VM's backing files
    async fn remove(&self, _keep_iso: bool) -> Result<()> {
        Ok(())
    }

    /// Power the guest down and release the control connection
    async fn shutdown(&self) -> Result<()>;
}

/// Creates VM handles for the execution driver
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self, info: &VmInfo) -> Result<Box<dyn Vm>>;
}

/// VM controlled through a monitor socket
pub struct MonitorVm {
    info: VmInfo,
    screenshot_dir: PathBuf,
    monitor: Monitor,
}

impl MonitorVm {
    pub fn new(info: VmInfo, monitor: Monitor, screenshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            info,
            screenshot_dir: screenshot_dir.into(),
            monitor,
        }
    }

    /// Connect to the monitor socket at `socket_path`
    pub async fn connect(
        info: VmInfo,
        socket_path: &Path,
        screenshot_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let monitor = Monitor::connect(socket_path).await?;
        Ok(Self::new(info, monitor, screenshot_dir))
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

#[async_trait]
impl Vm for MonitorVm {
    fn info(&self) -> &VmInfo {
        &self.info
    }

    async fn reset(&self) -> Result<()> {
        self.monitor.system_reset().await
    }

    async fn power_off(&self) -> Result<()> {
        self.monitor.system_powerdown().await
    }

    async fn screenshot(&self, name: &str) -> Result<PathBuf> {
        let path = self.screenshot_dir.join(name);
        self.monitor.screendump(&path).await?;
        Ok(path)
    }

    async fn send_key(&self, combo: &str) -> Result<()> {
        self.monitor.send_key(combo).await
    }

    async fn eject(&self, device: &str, force: bool) -> Result<()> {
        self.monitor.eject(device, force).await
    }

    async fn shutdown(&self) -> Result<()> {
        if self.monitor.is_connected().await {
            debug!("Powering down {}", self.info);
            let powerdown = self.monitor.system_powerdown().await;
            self.monitor.close().await;
            powerdown?;
        }
        Ok(())
    }
}
