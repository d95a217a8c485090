//! vmtest command engine
//!
//! Builds a test out of composable [`Command`]s, executes it against a
//! [`Vm`](vmtest_common::Vm) and reports pass/fail.
//!
//! ```text
//! Script (YAML) ──► Vec<BoxCommand> ──► Runner::run ──► pass / fail
//!                                          │
//!                                          ├── Provisioner::provision
//!                                          ├── Sequence::execute(Context)
//!                                          └── Runner::shutdown
//! ```

pub mod command;
pub mod context;
pub mod runner;
pub mod script;

pub use command::{BoxCommand, Command, CommandExt, Outcome};
pub use context::{Context, Environment, ScreenshotCounter};
pub use runner::{Runner, LOG_FILE};
pub use script::{Script, Step};
pub use vmtest_common::{Error, Failure, Result};
