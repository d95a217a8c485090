//! QuickEmu provisioning
//!
//! Creates test VMs with [quickget] and [quickemu] and hands them to the
//! engine as [`Vm`](vmtest_common::Vm) handles connected to the QEMU
//! monitor socket quickemu sets up.
//!
//! [quickget]: https://github.com/quickemu-project/quickemu
//! [quickemu]: https://github.com/quickemu-project/quickemu

pub mod config;
pub mod process;
pub mod quickemu;

pub use config::QuickEmuConfig;
pub use quickemu::{QuickEmu, QuickEmuProvisioner, QuickGet, Settings, VmPaths};
