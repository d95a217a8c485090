//! Test doubles shared by the engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use vmtest_common::{Error, Provisioner, Result, ScreenOracle, TextRecognizer, Vm, VmInfo};
use vmtest_engine::{Command, Context, Environment, Outcome};

/// Records every operation; writes a small PPM for each screenshot request
pub struct FakeVm {
    info: VmInfo,
    dir: PathBuf,
    pub ops: Arc<Mutex<Vec<String>>>,
    write_screenshots: bool,
}

impl FakeVm {
    pub fn new(info: VmInfo, dir: &Path) -> Self {
        Self {
            info,
            dir: dir.to_path_buf(),
            ops: Arc::new(Mutex::new(Vec::new())),
            write_screenshots: true,
        }
    }

    /// Accept screenshot requests without ever writing a file
    pub fn broken_screen(mut self) -> Self {
        self.write_screenshots = false;
        self
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: impl Into<String>) {
        self.ops.lock().unwrap().push(op.into());
    }
}

#[async_trait]
impl Vm for FakeVm {
    fn info(&self) -> &VmInfo {
        &self.info
    }

    async fn reset(&self) -> Result<()> {
        self.record("reset");
        Ok(())
    }

    async fn power_off(&self) -> Result<()> {
        self.record("power_off");
        Ok(())
    }

    async fn screenshot(&self, name: &str) -> Result<PathBuf> {
        self.record(format!("screenshot {}", name));
        let path = self.dir.join(name);
        if self.write_screenshots {
            DynamicImage::ImageRgb8(RgbImage::new(8, 4))
                .save_with_format(&path, image::ImageFormat::Pnm)?;
        }
        Ok(path)
    }

    async fn send_key(&self, combo: &str) -> Result<()> {
        self.record(format!("key {}", combo));
        Ok(())
    }

    async fn eject(&self, device: &str, force: bool) -> Result<()> {
        self.record(format!("eject {} {}", device, force));
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.record("shutdown");
        Ok(())
    }
}

/// Returns the same recognized text for every image
pub struct FixedText(pub String);

#[async_trait]
impl TextRecognizer for FixedText {
    async fn recognize(&self, _image: &DynamicImage, _language: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

pub fn environment(screen_text: &str) -> Environment {
    Environment {
        oracle: ScreenOracle::new(Arc::new(FixedText(screen_text.to_string()))),
        ..Environment::default()
    }
}

/// What a scripted test command does on each call
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail,
    Fatal,
    /// Fail until the given call (1-based), then succeed
    SucceedOnCall(u32),
}

/// Counts calls and behaves as configured
pub struct Probe {
    pub name: &'static str,
    pub behavior: Behavior,
    pub calls: Arc<AtomicU32>,
}

impl Probe {
    pub fn new(name: &'static str, behavior: Behavior) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                name,
                behavior,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl Command for Probe {
    async fn execute(&self, _ctx: &Context<'_>) -> Outcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(Error::failed(format!("{} failed", self.name))),
            Behavior::Fatal => Err(Error::Monitor("socket closed".to_string())),
            Behavior::SucceedOnCall(n) if call >= n => Ok(()),
            Behavior::SucceedOnCall(_) => Err(Error::failed(format!("{} not yet", self.name))),
        }
    }
}

impl std::fmt::Display for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Probe({})", self.name)
    }
}

/// Hands out a [`FakeVm`] sharing the provided op log
pub struct FakeProvisioner {
    pub dir: PathBuf,
    pub ops: Arc<Mutex<Vec<String>>>,
    pub provisioned: Arc<AtomicU32>,
}

impl FakeProvisioner {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            ops: Arc::new(Mutex::new(Vec::new())),
            provisioned: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn provision(&self, info: &VmInfo) -> Result<Box<dyn Vm>> {
        self.provisioned.fetch_add(1, Ordering::SeqCst);
        let mut vm = FakeVm::new(info.clone(), &self.dir);
        vm.ops = self.ops.clone();
        Ok(Box::new(vm))
    }
}

pub fn tempdir() -> TempDir {
    tempfile::tempdir().unwrap()
}

pub const SECOND: Duration = Duration::from_secs(1);
