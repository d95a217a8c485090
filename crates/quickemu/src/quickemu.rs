//! VMs launched through quickemu / quickget

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::QuickEmuConfig;
use crate::process::{
    pid_file_alive, read_pid, run_tool, signal_terminate, terminate, PidGuard, TERMINATE_GRACE,
};
use vmtest_common::monitor::wait_for_monitor;
use vmtest_common::{Error, Geometry, MonitorVm, Provisioner, Result, Vm, VmInfo};

/// Disks at least this large are treated as an existing installation
pub const MIN_DISK_SIZE: u64 = 1 << 30;

/// Seconds to wait for the monitor socket after launching
pub const MONITOR_TIMEOUT_SECS: u64 = 300;

/// Where and how VMs are created
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding `<vm-name>.conf` and `<vm-name>/`
    pub machine_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    pub geometry: Geometry,
    /// Connect to an already running VM instead of refusing
    pub reuse_vm: bool,
    /// Boot from an existing disk image instead of refusing
    pub reuse_disk: bool,
    /// Use a config prepared by hand instead of running quickget
    pub skip_quickget: bool,
    pub quickemu: String,
    pub quickget: String,
    pub monitor_timeout_secs: u64,
}

impl Settings {
    pub fn new(machine_dir: impl Into<PathBuf>, screenshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            machine_dir: machine_dir.into(),
            screenshot_dir: screenshot_dir.into(),
            geometry: Geometry::default(),
            reuse_vm: false,
            reuse_disk: false,
            skip_quickget: false,
            quickemu: "quickemu".to_string(),
            quickget: "quickget".to_string(),
            monitor_timeout_secs: MONITOR_TIMEOUT_SECS,
        }
    }
}

/// Files belonging to one VM
#[derive(Debug, Clone)]
pub struct VmPaths {
    pub name: String,
    pub config: PathBuf,
    pub dir: PathBuf,
    pub disk: PathBuf,
    pub pid_file: PathBuf,
    pub socket: PathBuf,
}

impl VmPaths {
    pub fn new(machine_dir: &Path, info: &VmInfo) -> Self {
        let name = info.vm_name();
        let dir = machine_dir.join(&name);
        Self {
            config: machine_dir.join(format!("{}.conf", name)),
            disk: dir.join("disk.qcow2"),
            pid_file: dir.join(format!("{}.pid", name)),
            socket: dir.join(format!("{}-monitor.socket", name)),
            dir,
            name,
        }
    }
}

/// What to do before connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// A VM is running and may be reused
    Reuse,
    /// Start a new VM
    Start,
}

/// Decide whether to start a VM, reuse a running one, or refuse
pub fn check(paths: &VmPaths, settings: &Settings) -> Result<Launch> {
    if pid_file_alive(&paths.pid_file) {
        if settings.reuse_vm {
            warn!("Reusing running VM {}", paths.name);
            return Ok(Launch::Reuse);
        }
        return Err(Error::AlreadyRunning(paths.name.clone()));
    }

    let disk_size = std::fs::metadata(&paths.disk).map(|m| m.len()).unwrap_or(0);
    if disk_size >= MIN_DISK_SIZE {
        if settings.reuse_disk {
            warn!("Reusing existing VM disk {}", paths.disk.display());
        } else {
            return Err(Error::DiskExists(paths.disk.clone()));
        }
    }

    Ok(Launch::Start)
}

/// A VM started by `quickemu` and controlled over its monitor socket
pub struct QuickEmu {
    vm: MonitorVm,
    paths: VmPaths,
    terminated: AtomicBool,
}

impl QuickEmu {
    /// Launch a VM, writing its config first
    pub async fn start(info: &VmInfo, settings: &Settings) -> Result<Self> {
        Self::launch(info, settings, true).await
    }

    async fn launch(info: &VmInfo, settings: &Settings, write_config: bool) -> Result<Self> {
        let paths = VmPaths::new(&settings.machine_dir, info);
        tokio::fs::create_dir_all(&paths.dir).await?;

        // Stops a VM we started if we never get to own it
        let mut guard = None;

        if check(&paths, settings)? == Launch::Start {
            let mut config = QuickEmuConfig::full(&paths.name, settings.geometry);
            let opts = config.apply_env(std::env::vars());
            if write_config {
                config.write(&paths.config).await?;
            }

            info!("Starting VM {} (options: {:?})", paths.name, opts);
            let mut args = vec!["--vm".to_string(), format!("{}.conf", paths.name)];
            args.extend(opts);
            guard = Some(PidGuard::new(&paths.pid_file));
            run_tool(&settings.quickemu, &args, &settings.machine_dir).await?;
        }

        let monitor = wait_for_monitor(&paths.socket, settings.monitor_timeout_secs).await?;
        let vm = MonitorVm::new(info.clone(), monitor, &settings.screenshot_dir);

        if let Some(guard) = guard {
            guard.disarm();
        }
        Ok(Self {
            vm,
            paths,
            terminated: AtomicBool::new(false),
        })
    }

    /// SIGTERM the VM process and wait for it to exit
    async fn kill(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(pid) = read_pid(&self.paths.pid_file) {
            debug!("Killing VM PID {}", pid);
            terminate(pid, TERMINATE_GRACE).await;
        }
    }
}

#[async_trait]
impl Vm for QuickEmu {
    fn info(&self) -> &VmInfo {
        self.vm.info()
    }

    async fn reset(&self) -> Result<()> {
        self.vm.reset().await
    }

    async fn power_off(&self) -> Result<()> {
        self.vm.power_off().await
    }

    async fn screenshot(&self, name: &str) -> Result<PathBuf> {
        self.vm.screenshot(name).await
    }

    async fn send_key(&self, combo: &str) -> Result<()> {
        self.vm.send_key(combo).await
    }

    async fn eject(&self, device: &str, force: bool) -> Result<()> {
        self.vm.eject(device, force).await
    }

    async fn remove(&self, keep_iso: bool) -> Result<()> {
        self.kill().await;
        self.vm.monitor().close().await;
        remove_files(&self.paths.dir, keep_iso)
    }

    async fn shutdown(&self) -> Result<()> {
        if let Err(e) = self.vm.shutdown().await {
            debug!("Power down of {} failed: {}", self.paths.name, e);
        }
        self.kill().await;
        Ok(())
    }
}

impl Drop for QuickEmu {
    fn drop(&mut self) {
        if !self.terminated.load(Ordering::SeqCst) {
            if let Some(pid) = read_pid(&self.paths.pid_file) {
                signal_terminate(pid);
            }
        }
    }
}

/// Delete every file under `dir`, optionally keeping ISO images
pub fn remove_files(dir: &Path, keep_iso: bool) -> Result<()> {
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_iso = entry.path().extension().map(|e| e == "iso").unwrap_or(false);
        if keep_iso && is_iso {
            continue;
        }

        debug!("Removing {}", entry.path().display());
        std::fs::remove_file(entry.path())?;
    }
    Ok(())
}

/// Downloads the VM image with `quickget`, then launches it like [`QuickEmu`]
pub struct QuickGet;

impl QuickGet {
    pub async fn start(info: &VmInfo, settings: &Settings) -> Result<QuickEmu> {
        info!("Retrieving VM for {}", info);
        let paths = VmPaths::new(&settings.machine_dir, info);
        tokio::fs::create_dir_all(&settings.machine_dir).await?;

        if paths.config.exists() {
            tokio::fs::remove_file(&paths.config).await?;
        }

        let mut args = vec![info.os.clone(), info.release.clone()];
        args.extend(info.edition.clone());
        run_tool(&settings.quickget, &args, &settings.machine_dir).await?;

        let mut display = QuickEmuConfig::display(settings.geometry);
        display.apply_env(std::env::vars());
        display.append(&paths.config).await?;

        QuickEmu::launch(info, settings, false).await
    }
}

/// Provisions VMs through quickget (unless skipped) and quickemu
#[derive(Debug, Clone)]
pub struct QuickEmuProvisioner {
    settings: Settings,
}

impl QuickEmuProvisioner {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Provisioner for QuickEmuProvisioner {
    async fn provision(&self, info: &VmInfo) -> Result<Box<dyn Vm>> {
        let vm = if self.settings.skip_quickget {
            QuickEmu::start(info, &self.settings).await?
        } else {
            QuickGet::start(info, &self.settings).await?
        };
        Ok(Box::new(vm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn solus() -> VmInfo {
        VmInfo::new("solus", "4.6").with_edition("budgie")
    }

    #[test]
    fn test_paths() {
        let paths = VmPaths::new(Path::new("machines"), &solus());
        assert_eq!(paths.name, "solus-4.6-budgie");
        assert_eq!(paths.config, Path::new("machines/solus-4.6-budgie.conf"));
        assert_eq!(
            paths.socket,
            Path::new("machines/solus-4.6-budgie/solus-4.6-budgie-monitor.socket")
        );
        assert_eq!(
            paths.pid_file,
            Path::new("machines/solus-4.6-budgie/solus-4.6-budgie.pid")
        );
        assert_eq!(paths.disk, Path::new("machines/solus-4.6-budgie/disk.qcow2"));
    }

    #[test]
    fn test_check_fresh_machine() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(dir.path(), dir.path());
        let paths = VmPaths::new(dir.path(), &solus());
        assert_eq!(check(&paths, &settings).unwrap(), Launch::Start);
    }

    #[test_case(false, false ; "refused")]
    #[test_case(true, true ; "reused")]
    fn test_check_running_vm(reuse_vm: bool, reused: bool) {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::new(dir.path(), dir.path());
        settings.reuse_vm = reuse_vm;

        let paths = VmPaths::new(dir.path(), &solus());
        std::fs::create_dir_all(&paths.dir).unwrap();
        std::fs::write(&paths.pid_file, std::process::id().to_string()).unwrap();

        match check(&paths, &settings) {
            Ok(launch) => {
                assert!(reused);
                assert_eq!(launch, Launch::Reuse);
            }
            Err(err) => {
                assert!(!reused);
                assert!(matches!(err, Error::AlreadyRunning(name) if name == "solus-4.6-budgie"));
            }
        }
    }

    #[test_case(MIN_DISK_SIZE - 1, false, true ; "small disk is ignored")]
    #[test_case(MIN_DISK_SIZE, false, false ; "installed disk is refused")]
    #[test_case(MIN_DISK_SIZE, true, true ; "installed disk is reused")]
    fn test_check_existing_disk(size: u64, reuse_disk: bool, starts: bool) {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::new(dir.path(), dir.path());
        settings.reuse_disk = reuse_disk;

        let paths = VmPaths::new(dir.path(), &solus());
        std::fs::create_dir_all(&paths.dir).unwrap();
        std::fs::File::create(&paths.disk)
            .unwrap()
            .set_len(size)
            .unwrap();

        let result = check(&paths, &settings);
        assert_eq!(result.is_ok(), starts);
        if let Err(err) = result {
            assert!(matches!(err, Error::DiskExists(_)));
        }
    }

    #[test_case(true, &["solus.iso"] ; "keep iso")]
    #[test_case(false, &[] ; "remove iso")]
    fn test_remove_files(keep_iso: bool, left: &[&str]) {
        let dir = tempfile::tempdir().unwrap();
        for file in ["solus.iso", "disk.qcow2", "solus.pid"] {
            std::fs::write(dir.path().join(file), "x").unwrap();
        }

        remove_files(dir.path(), keep_iso).unwrap();

        let mut remaining: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        remaining.sort();
        assert_eq!(remaining, left);
    }
}
