//! Execution context handed to every command

use std::sync::atomic::{AtomicU32, Ordering};
use vmtest_common::{Keymap, Localization, ScreenOracle, Vm};

/// Hands out screenshot ordinals: strictly increasing, gap-free, from 0
#[derive(Debug, Default)]
pub struct ScreenshotCounter(AtomicU32);

impl ScreenshotCounter {
    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of ordinals handed out so far
    pub fn taken(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Configuration shared by all commands of one run.
///
/// Set up once before execution starts and never mutated afterwards.
pub struct Environment {
    pub keymap: Keymap,
    pub localization: Localization,
    pub oracle: ScreenOracle,
    pub screenshots: ScreenshotCounter,
}

impl Environment {
    pub fn new(keymap: Keymap, localization: Localization, oracle: ScreenOracle) -> Self {
        Self {
            keymap,
            localization,
            oracle,
            screenshots: ScreenshotCounter::default(),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(
            Keymap::default(),
            Localization::default(),
            ScreenOracle::default(),
        )
    }
}

/// What a command executes against
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub vm: &'a dyn Vm,
    pub env: &'a Environment,
}

impl<'a> Context<'a> {
    pub fn new(vm: &'a dyn Vm, env: &'a Environment) -> Self {
        Self { vm, env }
    }
}
