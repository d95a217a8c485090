//! VM control leaves and plain delays

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::info;

use super::{pause, seconds, Command, Outcome};
use crate::context::Context;

/// Waits for a fixed time
#[derive(Debug, Clone, Copy)]
pub struct Sleep(pub Duration);

impl Sleep {
    pub fn secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }
}

#[async_trait]
impl Command for Sleep {
    async fn execute(&self, _ctx: &Context<'_>) -> Outcome {
        info!("Sleeping {}", seconds(self.0));
        pause(self.0).await;
        Ok(())
    }
}

impl fmt::Display for Sleep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sleep({})", seconds(self.0))
    }
}

/// Ejects removable media, forcing by default
#[derive(Debug, Clone)]
pub struct Eject {
    device: String,
    force: bool,
}

impl Eject {
    pub const DEFAULT_DEVICE: &'static str = "ide0-cd0";

    pub fn new(device: impl Into<String>, force: bool) -> Self {
        Self {
            device: device.into(),
            force,
        }
    }
}

impl Default for Eject {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEVICE, true)
    }
}

#[async_trait]
impl Command for Eject {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        info!("Ejecting {}", self.device);
        ctx.vm.eject(&self.device, self.force).await
    }
}

impl fmt::Display for Eject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Eject({})", self.device)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PowerOff;

#[async_trait]
impl Command for PowerOff {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        info!("Powering off the VM");
        ctx.vm.power_off().await
    }
}

impl fmt::Display for PowerOff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PowerOff")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reboot;

#[async_trait]
impl Command for Reboot {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        info!("Rebooting the VM");
        ctx.vm.reset().await
    }
}

impl fmt::Display for Reboot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reboot")
    }
}
