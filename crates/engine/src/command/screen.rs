//! Screenshots and on-screen text checks

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use super::{pause, Command, Outcome};
use crate::context::Context;
use vmtest_common::imaging::make_png;
use vmtest_common::{Error, Phrase, Result, DEFAULT_OCR_SCALE};

/// How long the hypervisor gets to write a requested screenshot
pub const SCREENSHOT_GRACE: Duration = Duration::from_secs(1);

/// Captures the screen into `screenshot_<ordinal>[_<name>].png`
#[derive(Debug, Clone, Default)]
pub struct Screenshot {
    name: String,
    wait_before: Duration,
}

impl Screenshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wait_before: Duration::ZERO,
        }
    }

    pub fn wait_before(mut self, wait: Duration) -> Self {
        self.wait_before = wait;
        self
    }

    /// Raw capture file name for an ordinal
    pub fn file_name(ordinal: u32, name: &str) -> String {
        let mut file = format!("screenshot_{:04}", ordinal);
        if !name.is_empty() {
            file.push('_');
            file.push_str(name);
        }
        file.push_str(".ppm");
        file
    }

    /// Capture a screenshot and return the path of the converted PNG.
    ///
    /// Fails if the hypervisor has not written the capture once the grace
    /// period is over.
    pub async fn capture(&self, ctx: &Context<'_>) -> Result<PathBuf> {
        pause(self.wait_before).await;

        let ordinal = ctx.env.screenshots.next();
        let raw = ctx.vm.screenshot(&Self::file_name(ordinal, &self.name)).await?;

        tokio::time::sleep(SCREENSHOT_GRACE).await;
        if !raw.exists() {
            return Err(Error::failed("Screenshot failed"));
        }

        make_png(&raw)
    }
}

#[async_trait]
impl Command for Screenshot {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let path = self.capture(ctx).await?;
        info!("Screenshot: {}", path.display());
        Ok(())
    }
}

impl fmt::Display for Screenshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Screenshot({:?})", self.name)
    }
}

/// Succeeds iff the text (or pattern) is found on a fresh screenshot
#[derive(Debug, Clone)]
pub struct FindText {
    text: Phrase,
    match_case: bool,
    regex: bool,
    ocr_scale: f32,
    screenshot: Screenshot,
}

impl FindText {
    pub fn new(text: impl Into<Phrase>) -> Self {
        Self {
            text: text.into(),
            match_case: false,
            regex: false,
            ocr_scale: DEFAULT_OCR_SCALE,
            screenshot: Screenshot::default(),
        }
    }

    /// Look the text up in the localization at execution time
    pub fn i18n(key: impl Into<String>) -> Self {
        Self::new(Phrase::Key(key.into()))
    }

    pub fn match_case(mut self, match_case: bool) -> Self {
        self.match_case = match_case;
        self
    }

    /// Treat the text as a regular expression
    pub fn regex(mut self, regex: bool) -> Self {
        self.regex = regex;
        self
    }

    pub fn ocr_scale(mut self, scale: f32) -> Self {
        self.ocr_scale = scale;
        self
    }
}

#[async_trait]
impl Command for FindText {
    async fn execute(&self, ctx: &Context<'_>) -> Outcome {
        let localization = &ctx.env.localization;
        let text = self.text.resolve(localization)?;
        let file = self.screenshot.capture(ctx).await?;

        let oracle = &ctx.env.oracle;
        let language = localization.ocr_language();
        let found = if self.regex {
            oracle
                .search_regex(&file, text, self.match_case, self.ocr_scale, language)
                .await?
        } else {
            oracle
                .search(&file, text, self.match_case, self.ocr_scale, language)
                .await?
        };

        if found {
            info!("Found {:?}", text);
            Ok(())
        } else {
            Err(Error::failed(format!("{:?} not found", text)))
        }
    }
}

impl fmt::Display for FindText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FindText({})", self.text)
    }
}
