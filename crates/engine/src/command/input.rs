//! Keyboard input

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::info;

use super::{pause, Command, Outcome};
use crate::context::Context;
use vmtest_common::Keymap;

/// Sends keys one by one through the active keymap
#[derive(Debug, Clone)]
pub struct Keys {
    keys: Vec<String>,
    wait: Duration,
    interval: Duration,
    keymap: Option<Keymap>,
}

impl Keys {
    pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);

    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            wait: Self::DEFAULT_WAIT,
            interval: Duration::ZERO,
            keymap: None,
        }
    }

    /// Pause after the last key
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Pause between consecutive keys
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Use this keymap instead of the run's keymap
    pub fn keymap(mut self, keymap: Keymap) -> Self {
        self.keymap = Some(keymap);
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

#[async_trait]
impl Command for Keys {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        info!("Keys: {}", self.quoted());

        let keymap = self.keymap.as_ref().unwrap_or(&ctx.env.keymap);
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                pause(self.interval).await;
            }
            ctx.vm.send_key(&keymap.map(key)).await?;
        }

        pause(self.wait).await;
        Ok(())
    }
}

impl Keys {
    fn quoted(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{:?}", k))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keys({})", self.quoted())
    }
}

/// Types a string character by character
#[derive(Debug, Clone)]
pub struct Text {
    text: String,
    keys: Keys,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let keys = Keys::new(text.chars().map(String::from));
        Self { text, keys }
    }

    pub fn wait(mut self, wait: Duration) -> Self {
        self.keys = self.keys.wait(wait);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.keys = self.keys.interval(interval);
        self
    }

    pub fn keymap(mut self, keymap: Keymap) -> Self {
        self.keys = self.keys.keymap(keymap);
        self
    }
}

#[async_trait]
impl Command for Text {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        self.keys.execute(ctx).await
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Text({:?})", self.text)
    }
}
