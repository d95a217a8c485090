//! Combinators: sequencing, alternatives, guards and polling

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use super::{join_commands, pause, seconds, BoxCommand, Command, Outcome};
use crate::context::Context;
use vmtest_common::{Error, Failure, Vm};

/// Runs children in order, stopping at the first failure
pub struct Sequence {
    commands: Vec<BoxCommand>,
}

impl Sequence {
    pub fn new(commands: Vec<BoxCommand>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl Command for Sequence {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        for command in &self.commands {
            command.execute(ctx).await?;
        }
        Ok(())
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sequence(")?;
        join_commands(f, &self.commands)?;
        write!(f, ")")
    }
}

/// Fails unless every child succeeds; same evaluation as [`Sequence`]
pub struct And(Sequence);

impl And {
    pub fn new(commands: Vec<BoxCommand>) -> Self {
        Self(Sequence::new(commands))
    }
}

#[async_trait]
impl Command for And {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        self.0.execute(ctx).await
    }
}

impl fmt::Display for And {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "And(")?;
        join_commands(f, &self.0.commands)?;
        write!(f, ")")
    }
}

/// Succeeds with the first child that succeeds; later children never run
pub struct Or {
    commands: Vec<BoxCommand>,
}

impl Or {
    pub fn new(commands: Vec<BoxCommand>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl Command for Or {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let mut failures: Vec<Failure> = Vec::new();

        for command in &self.commands {
            match command.execute(ctx).await {
                Ok(()) => return Ok(()),
                Err(Error::Failed(failure)) => {
                    debug!("Alternative failed: {}", failure);
                    failures.push(failure);
                }
                Err(e) => return Err(e),
            }
        }

        let messages: Vec<&str> = failures.iter().map(|f| f.message.as_str()).collect();
        Err(Error::failed(format!(
            "All commands failed: {}",
            messages.join(", ")
        )))
    }
}

impl fmt::Display for Or {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Or(")?;
        join_commands(f, &self.commands)?;
        write!(f, ")")
    }
}

/// Guard of an [`If`]
pub enum Condition {
    Fixed(bool),
    Predicate(Box<dyn Fn(&dyn Vm) -> bool + Send + Sync>),
}

impl Condition {
    pub fn holds(&self, vm: &dyn Vm) -> bool {
        match self {
            Condition::Fixed(value) => *value,
            Condition::Predicate(predicate) => predicate(vm),
        }
    }
}

/// Runs children as a [`Sequence`] when the condition holds, otherwise succeeds
pub struct If {
    condition: Condition,
    body: Sequence,
}

impl If {
    pub fn new(condition: bool, commands: Vec<BoxCommand>) -> Self {
        Self {
            condition: Condition::Fixed(condition),
            body: Sequence::new(commands),
        }
    }

    pub fn when<F>(predicate: F, commands: Vec<BoxCommand>) -> Self
    where
        F: Fn(&dyn Vm) -> bool + Send + Sync + 'static,
    {
        Self {
            condition: Condition::Predicate(Box::new(predicate)),
            body: Sequence::new(commands),
        }
    }
}

#[async_trait]
impl Command for If {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        if self.condition.holds(ctx.vm) {
            self.body.execute(ctx).await
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for If {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.condition {
            Condition::Fixed(value) => write!(f, "If({}, ", value)?,
            Condition::Predicate(_) => write!(f, "If(<predicate>, ")?,
        }
        join_commands(f, &self.body.commands)?;
        write!(f, ")")
    }
}

/// Field of [`VmInfo`](vmtest_common::VmInfo) a guard compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoField {
    Os,
    Release,
    Edition,
}

impl InfoField {
    fn name(&self) -> &'static str {
        match self {
            InfoField::Os => "OS",
            InfoField::Release => "Release",
            InfoField::Edition => "Edition",
        }
    }
}

/// Runs children when a VM info field equals `expected`, ignoring case.
///
/// An unset field never matches.
pub struct IfInfo {
    field: InfoField,
    expected: String,
    body: Sequence,
}

impl IfInfo {
    pub fn new(field: InfoField, expected: impl Into<String>, commands: Vec<BoxCommand>) -> Self {
        Self {
            field,
            expected: expected.into(),
            body: Sequence::new(commands),
        }
    }

    pub fn edition(name: impl Into<String>, commands: Vec<BoxCommand>) -> Self {
        Self::new(InfoField::Edition, name, commands)
    }

    pub fn os(name: impl Into<String>, commands: Vec<BoxCommand>) -> Self {
        Self::new(InfoField::Os, name, commands)
    }

    pub fn release(name: impl Into<String>, commands: Vec<BoxCommand>) -> Self {
        Self::new(InfoField::Release, name, commands)
    }

    fn matches(&self, vm: &dyn Vm) -> bool {
        let info = vm.info();
        let actual = match self.field {
            InfoField::Os => Some(info.os.as_str()),
            InfoField::Release => Some(info.release.as_str()),
            InfoField::Edition => info.edition.as_deref(),
        };

        actual
            .map(|value| value.to_lowercase() == self.expected.to_lowercase())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Command for IfInfo {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let matches = self.matches(ctx.vm);
        info!(
            "{} {:?} matches: {}",
            self.field.name(),
            self.expected,
            matches
        );

        if matches {
            self.body.execute(ctx).await
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for IfInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "If{}({:?}, ", self.field.name(), self.expected)?;
        join_commands(f, &self.body.commands)?;
        write!(f, ")")
    }
}

/// Re-runs a command until it succeeds or the attempts run out
pub struct WaitFor {
    command: BoxCommand,
    attempts: u32,
    interval: Duration,
}

impl WaitFor {
    pub const DEFAULT_ATTEMPTS: u32 = 10;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new(command: BoxCommand) -> Self {
        Self {
            command,
            attempts: Self::DEFAULT_ATTEMPTS,
            interval: Self::DEFAULT_INTERVAL,
        }
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[async_trait]
impl Command for WaitFor {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let mut last: Option<Failure> = None;

        for attempt in 0..self.attempts {
            if attempt > 0 {
                pause(self.interval).await;
            }

            info!(
                "{}/{} {} (retry in {})",
                attempt + 1,
                self.attempts,
                self.command,
                seconds(self.interval)
            );

            match self.command.execute(ctx).await {
                Ok(()) => return Ok(()),
                Err(Error::Failed(failure)) => {
                    debug!("Attempt failed: {}", failure);
                    last = Some(failure);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::failed(format!(
            "Give up after {} attempts: {}",
            self.attempts,
            last.map(|f| f.message).unwrap_or_default()
        )))
    }
}

impl fmt::Display for WaitFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WaitFor({})", self.command)
    }
}
