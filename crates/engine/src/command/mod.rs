//! Command tree
//!
//! A test is a tree of [`Command`]s built up front and executed once, top
//! to bottom. Leaves act on the VM; combinators decide what to run next
//! based on whether children returned a [`Failure`](vmtest_common::Failure).
//! Fatal errors pass through every combinator untouched.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::context::Context;
use vmtest_common::Result;

mod control;
mod flow;
mod input;
mod screen;

pub use control::{Eject, PowerOff, Reboot, Sleep};
pub use flow::{And, Condition, If, IfInfo, InfoField, Or, Sequence, WaitFor};
pub use input::{Keys, Text};
pub use screen::{FindText, Screenshot, SCREENSHOT_GRACE};

/// Result of executing a command
pub type Outcome = Result<()>;

/// A node of the command tree
#[async_trait]
pub trait Command: Send + Sync + fmt::Display {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome;
}

pub type BoxCommand = Box<dyn Command>;

/// Convenience for building trees out of concrete commands
pub trait CommandExt: Command + Sized + 'static {
    fn boxed(self) -> BoxCommand {
        Box::new(self)
    }
}

impl<T: Command + 'static> CommandExt for T {}

/// Sleep unless the duration is zero
pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

pub(crate) fn seconds(duration: Duration) -> String {
    format!("{} s", duration.as_secs_f64())
}

fn join_commands(f: &mut fmt::Formatter<'_>, commands: &[BoxCommand]) -> fmt::Result {
    for (i, command) in commands.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", command)?;
    }
    Ok(())
}
