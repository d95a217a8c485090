//! vmtest Common Library
//!
//! Shared types and the VM-facing building blocks: the monitor protocol
//! client, the [`Vm`] control interface, keyboard layouts, localization and
//! the OCR-backed [`ScreenOracle`].

pub mod error;
pub mod i18n;
pub mod imaging;
pub mod keymap;
pub mod monitor;
pub mod ocr;
pub mod types;
pub mod vm;

// Re-export commonly used types
pub use error::{Error, Failure, Result};
pub use i18n::{Localization, Phrase};
pub use keymap::Keymap;
pub use monitor::Monitor;
pub use ocr::{ScreenOracle, Tesseract, TextRecognizer, DEFAULT_OCR_SCALE};
pub use types::*;
pub use vm::{MonitorVm, Provisioner, Vm};
