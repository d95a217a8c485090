//! Test case discovery
//!
//! Test cases live in `<dir>/<os>[/<release>[/<edition>]]/<name>.yaml`.
//! Files whose name starts with `_` are shared fragments for `include`
//! and are not test cases on their own.

use anyhow::{bail, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::output::TableDisplay;
use vmtest_engine::Script;

/// Extension of test scripts
pub const EXTENSION: &str = "yaml";

/// Placeholder for a release or edition a test case applies to in general
pub const ANY: &str = "*";

/// A discovered test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub os: String,
    pub release: String,
    pub edition: String,
    pub name: String,
    pub description: String,
    pub path: PathBuf,
}

impl TestCase {
    /// Build a test case from a script below `root`
    pub fn from_file(root: &Path, file: &Path) -> Option<Self> {
        let relative = file.strip_prefix(root).ok()?;
        let dirs: Vec<String> = relative
            .parent()?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();

        let os = dirs.first()?.clone();
        let release = dirs.get(1).cloned().unwrap_or_else(|| ANY.to_string());
        let edition = dirs.get(2).cloned().unwrap_or_else(|| ANY.to_string());
        let name = file.file_stem()?.to_string_lossy().to_string();
        let description = Script::read_description(file).unwrap_or_default();

        Some(Self {
            os,
            release,
            edition,
            name,
            description,
            path: file.to_path_buf(),
        })
    }
}

impl TableDisplay for TestCase {
    fn headers() -> Vec<&'static str> {
        vec!["OS", "Release", "Edition", "Test name", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.os.clone(),
            self.release.clone(),
            self.edition.clone(),
            self.name.clone(),
            self.description.clone(),
        ]
    }
}

fn is_test_script(path: &Path) -> bool {
    let is_yaml = path.extension().map(|e| e == EXTENSION).unwrap_or(false);
    let is_fragment = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('_'))
        .unwrap_or(true);
    is_yaml && !is_fragment
}

/// All test cases below `root`, sorted by path
pub fn discover(root: &Path) -> Vec<TestCase> {
    let mut cases: Vec<TestCase> = WalkDir::new(root)
        .min_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_test_script(e.path()))
        .filter_map(|e| TestCase::from_file(root, e.path()))
        .collect();

    cases.sort_by(|a, b| a.path.cmp(&b.path));
    cases
}

/// Most specific script for a test: `os/release/edition/name.yaml`, then
/// `os/release/name.yaml`, then `os/name.yaml`
pub fn resolve(
    root: &Path,
    name: &str,
    os: &str,
    release: &str,
    edition: Option<&str>,
) -> Result<PathBuf> {
    let mut components: Vec<&str> = vec![os, release];
    components.extend(edition.filter(|e| !e.is_empty()));

    let file = format!("{}.{}", name, EXTENSION);
    while !components.is_empty() {
        let path = components
            .iter()
            .fold(root.to_path_buf(), |p, c| p.join(c))
            .join(&file);
        if path.is_file() {
            return Ok(path);
        }
        components.pop();
    }

    bail!("Test {:?} could not be found", name)
}
