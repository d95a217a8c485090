//! Screen oracle
//!
//! Reads text off a screenshot with OCR and answers "is this text on
//! screen?". The image is scaled up before recognition because installer
//! fonts are small. Retrying belongs to the caller; a search here is a
//! single deterministic look at one image.

use async_trait::async_trait;
use image::DynamicImage;
use regex::RegexBuilder;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

use crate::imaging::scaled_image;
use crate::{Error, Result};

/// Default upscaling factor applied before OCR
pub const DEFAULT_OCR_SCALE: f32 = 3.0;

/// OCR backend
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &DynamicImage, language: &str) -> Result<String>;
}

/// Runs the `tesseract` executable
#[derive(Debug, Clone)]
pub struct Tesseract {
    binary: String,
}

impl Tesseract {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for Tesseract {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl TextRecognizer for Tesseract {
    async fn recognize(&self, image: &DynamicImage, language: &str) -> Result<String> {
        let file = tempfile::Builder::new()
            .prefix("vmtest-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save(file.path())?;

        let output = Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .args(["-l", language])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Ocr(format!("Failed to run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(Error::Ocr(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Answers text queries against screenshot files
#[derive(Clone)]
pub struct ScreenOracle {
    recognizer: Arc<dyn TextRecognizer>,
}

impl ScreenOracle {
    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self { recognizer }
    }

    pub fn tesseract() -> Self {
        Self::new(Arc::new(Tesseract::default()))
    }

    /// OCR a screenshot after scaling it by `scale`
    pub async fn read(&self, file: &Path, scale: f32, language: &str) -> Result<String> {
        let img = scaled_image(file, scale)?;
        let data = self.recognizer.recognize(&img, language).await?;
        debug!("OCR data: {:?}", data);
        Ok(data)
    }

    /// Search a screenshot for literal text
    pub async fn search(
        &self,
        file: &Path,
        text: &str,
        match_case: bool,
        scale: f32,
        language: &str,
    ) -> Result<bool> {
        let data = self.read(file, scale, language).await?;
        Ok(contains_text(&data, text, match_case))
    }

    /// Search a screenshot for a regular expression
    pub async fn search_regex(
        &self,
        file: &Path,
        pattern: &str,
        match_case: bool,
        scale: f32,
        language: &str,
    ) -> Result<bool> {
        let data = self.read(file, scale, language).await?;
        matches_pattern(&data, pattern, match_case)
    }
}

impl Default for ScreenOracle {
    fn default() -> Self {
        Self::tesseract()
    }
}

pub fn contains_text(haystack: &str, needle: &str, match_case: bool) -> bool {
    if match_case {
        return haystack.contains(needle);
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn matches_pattern(haystack: &str, pattern: &str, match_case: bool) -> Result<bool> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(!match_case)
        .build()?;
    Ok(re.is_match(haystack))
}
