//! Error types for vmtest
//!
//! Two tiers: a [`Failure`] is the expected, recoverable outcome of a check
//! that did not hold (text not on screen, screenshot never written). Every
//! other [`Error`] variant is fatal and aborts the whole run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using vmtest Error
pub type Result<T> = std::result::Result<T, Error>;

/// A recoverable failure raised by a leaf command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Failure {
    pub message: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// vmtest error types
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Failed(#[from] Failure),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Monitor error: {0}")]
    Monitor(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Missing localization for {0:?}")]
    MissingLocalization(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Script error: {0}")]
    Script(String),

    #[error("VM {0} is already running")]
    AlreadyRunning(String),

    #[error("VM disk already exists: {}", .0.display())]
    DiskExists(PathBuf),

    #[error("Provisioning error: {0}")]
    Provision(String),

    #[error("Operation timeout after {seconds}s")]
    Timeout { seconds: u64 },
}

impl Error {
    /// Shorthand for a recoverable failure
    pub fn failed(message: impl Into<String>) -> Self {
        Error::Failed(Failure::new(message))
    }

    /// Whether this is a recoverable failure rather than a fatal error
    pub fn is_failure(&self) -> bool {
        matches!(self, Error::Failed(_))
    }
}
