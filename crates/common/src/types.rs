//! Core types for vmtest

use serde::{Deserialize, Serialize};

/// Identifies the operating system image under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInfo {
    pub os: String,
    pub release: String,
    #[serde(default)]
    pub edition: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
}

impl VmInfo {
    pub fn new(os: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            release: release.into(),
            edition: None,
            variant: None,
        }
    }

    pub fn with_edition(mut self, edition: impl Into<String>) -> Self {
        self.edition = Some(edition.into());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Non-empty identifying fields in fixed order: os, release, edition, variant
    pub fn parts(&self) -> Vec<&str> {
        [
            Some(self.os.as_str()),
            Some(self.release.as_str()),
            self.edition.as_deref(),
            self.variant.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect()
    }

    /// Canonical name used for VM directories and socket paths
    pub fn vm_name(&self) -> String {
        self.parts().join("-")
    }
}

impl std::fmt::Display for VmInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.parts().join(" "))
    }
}

/// Screen size of the guest display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}
