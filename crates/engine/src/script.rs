//! Declarative YAML test scripts
//!
//! A script is a YAML file whose first line is a `# description` comment
//! and whose `steps` list maps one-to-one onto the command tree:
//!
//! ```yaml
//! # Boot to the login screen
//! steps:
//!   - wait_for:
//!       find_text: { i18n: login }
//!   - text: "root\n"
//!   - screenshot: {}
//!   - keys: [ctrl-d]
//!   - power_off
//! ```
//!
//! `include: _common.yaml` splices in the steps of another script,
//! resolved relative to the including file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::{
    And, BoxCommand, CommandExt, Eject, FindText, If, IfInfo, Keys, Or, PowerOff, Reboot,
    Screenshot, Sequence, Sleep, Text, WaitFor,
};
use vmtest_common::{Error, Result, DEFAULT_OCR_SCALE};

/// A single step in a script
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Sequence(Vec<Step>),

    And(Vec<Step>),

    /// First step that succeeds wins
    Or(Vec<Step>),

    If {
        when: When,
        steps: Vec<Step>,
    },

    IfEdition {
        name: String,
        steps: Vec<Step>,
    },

    IfOs {
        name: String,
        steps: Vec<Step>,
    },

    IfRelease {
        name: String,
        steps: Vec<Step>,
    },

    WaitFor(WaitForStep),

    Keys(KeysStep),

    Text(TextStep),

    FindText(FindTextStep),

    Screenshot(ScreenshotStep),

    /// Seconds
    Sleep(f64),

    Eject,

    PowerOff,

    Reboot,

    /// Path of another script, relative to this one
    Include(PathBuf),
}

/// Condition of an `if` step, evaluated when the script is loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum When {
    Fixed(bool),
    Env {
        env: String,
        equals: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl When {
    pub fn evaluate(&self) -> bool {
        match self {
            When::Fixed(value) => *value,
            When::Env {
                env,
                equals,
                default,
            } => std::env::var(env).ok().or_else(|| default.clone()).as_deref() == Some(equals),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WaitForStep {
    Full {
        step: Box<Step>,
        #[serde(default = "default_attempts")]
        attempts: u32,
        #[serde(default = "default_interval")]
        interval: f64,
    },
    Short(Box<Step>),
}

fn default_attempts() -> u32 {
    WaitFor::DEFAULT_ATTEMPTS
}

fn default_interval() -> f64 {
    WaitFor::DEFAULT_INTERVAL.as_secs_f64()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeysStep {
    One(String),
    List(Vec<String>),
    Full {
        keys: Vec<String>,
        #[serde(default = "default_wait")]
        wait: f64,
        #[serde(default)]
        interval: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextStep {
    Plain(String),
    Full {
        text: String,
        #[serde(default = "default_wait")]
        wait: f64,
        #[serde(default)]
        interval: f64,
    },
}

fn default_wait() -> f64 {
    Keys::DEFAULT_WAIT.as_secs_f64()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FindTextStep {
    Plain(String),
    Full {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        i18n: Option<String>,
        #[serde(default)]
        match_case: bool,
        #[serde(default)]
        regex: bool,
        #[serde(default = "default_ocr_scale")]
        ocr_scale: f32,
    },
}

fn default_ocr_scale() -> f32 {
    DEFAULT_OCR_SCALE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScreenshotStep {
    Named(String),
    Full {
        #[serde(default)]
        name: String,
        #[serde(default)]
        wait_before: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScriptFile {
    #[serde(default)]
    steps: Vec<Step>,
}

/// A parsed test script
#[derive(Debug, Clone)]
pub struct Script {
    /// File the script was loaded from, used to resolve includes
    pub path: Option<PathBuf>,
    pub description: String,
    pub steps: Vec<Step>,
}

impl Script {
    /// Parse a script from YAML; includes resolve against the working directory
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: ScriptFile = serde_yaml::from_str(yaml)?;
        Ok(Self {
            path: None,
            description: description(yaml),
            steps: file.steps,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Script(format!("Cannot read {}: {}", path.display(), e)))?;
        let mut script = Self::from_yaml(&content)
            .map_err(|e| Error::Script(format!("{}: {}", path.display(), e)))?;
        script.path = Some(path.to_path_buf());
        Ok(script)
    }

    /// Description from the first line of a script file
    pub fn read_description(path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path)?;
        Ok(description(&content))
    }

    /// Build the command tree, resolving includes
    pub fn commands(&self) -> Result<Vec<BoxCommand>> {
        let mut stack = Vec::new();
        if let Some(path) = &self.path {
            stack.push(canonical(path));
        }

        let base = self
            .path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut builder = Builder { stack };
        builder.build_all(&self.steps, &base)
    }
}

fn description(yaml: &str) -> String {
    yaml.lines()
        .next()
        .and_then(|line| line.strip_prefix('#'))
        .map(|d| d.trim().to_string())
        .unwrap_or_default()
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn secs(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::Script(format!("Invalid duration: {}", value)))
}

struct Builder {
    // Include files currently being expanded, to reject cycles
    stack: Vec<PathBuf>,
}

impl Builder {
    fn build_all(&mut self, steps: &[Step], base: &Path) -> Result<Vec<BoxCommand>> {
        steps.iter().map(|s| self.build(s, base)).collect()
    }

    fn build(&mut self, step: &Step, base: &Path) -> Result<BoxCommand> {
        let command = match step {
            Step::Sequence(steps) => Sequence::new(self.build_all(steps, base)?).boxed(),
            Step::And(steps) => And::new(self.build_all(steps, base)?).boxed(),
            Step::Or(steps) => Or::new(self.build_all(steps, base)?).boxed(),
            Step::If { when, steps } => If::new(when.evaluate(), self.build_all(steps, base)?).boxed(),
            Step::IfEdition { name, steps } => {
                IfInfo::edition(name.clone(), self.build_all(steps, base)?).boxed()
            }
            Step::IfOs { name, steps } => {
                IfInfo::os(name.clone(), self.build_all(steps, base)?).boxed()
            }
            Step::IfRelease { name, steps } => {
                IfInfo::release(name.clone(), self.build_all(steps, base)?).boxed()
            }
            Step::WaitFor(WaitForStep::Short(step)) => WaitFor::new(self.build(step, base)?).boxed(),
            Step::WaitFor(WaitForStep::Full {
                step,
                attempts,
                interval,
            }) => WaitFor::new(self.build(step, base)?)
                .attempts(*attempts)
                .interval(secs(*interval)?)
                .boxed(),
            Step::Keys(KeysStep::One(key)) => Keys::new([key.clone()]).boxed(),
            Step::Keys(KeysStep::List(keys)) => Keys::new(keys.clone()).boxed(),
            Step::Keys(KeysStep::Full {
                keys,
                wait,
                interval,
            }) => Keys::new(keys.clone())
                .wait(secs(*wait)?)
                .interval(secs(*interval)?)
                .boxed(),
            Step::Text(TextStep::Plain(text)) => Text::new(text.clone()).boxed(),
            Step::Text(TextStep::Full {
                text,
                wait,
                interval,
            }) => Text::new(text.clone())
                .wait(secs(*wait)?)
                .interval(secs(*interval)?)
                .boxed(),
            Step::FindText(FindTextStep::Plain(text)) => FindText::new(text.as_str()).boxed(),
            Step::FindText(FindTextStep::Full {
                text,
                i18n,
                match_case,
                regex,
                ocr_scale,
            }) => {
                let find = match (text, i18n) {
                    (Some(text), None) => FindText::new(text.as_str()),
                    (None, Some(key)) => FindText::i18n(key.clone()),
                    _ => {
                        return Err(Error::Script(
                            "find_text needs exactly one of `text` or `i18n`".to_string(),
                        ))
                    }
                };
                find.match_case(*match_case)
                    .regex(*regex)
                    .ocr_scale(*ocr_scale)
                    .boxed()
            }
            Step::Screenshot(ScreenshotStep::Named(name)) => Screenshot::new(name.clone()).boxed(),
            Step::Screenshot(ScreenshotStep::Full { name, wait_before }) => {
                Screenshot::new(name.clone())
                    .wait_before(secs(*wait_before)?)
                    .boxed()
            }
            Step::Sleep(seconds) => Sleep(secs(*seconds)?).boxed(),
            Step::Eject => Eject::default().boxed(),
            Step::PowerOff => PowerOff.boxed(),
            Step::Reboot => Reboot.boxed(),
            Step::Include(path) => self.include(&base.join(path))?,
        };

        Ok(command)
    }

    fn include(&mut self, path: &Path) -> Result<BoxCommand> {
        let key = canonical(path);
        if self.stack.contains(&key) {
            return Err(Error::Script(format!(
                "Include cycle through {}",
                path.display()
            )));
        }

        let script = Script::from_file(path)?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();

        self.stack.push(key);
        let commands = self.build_all(&script.steps, &base);
        self.stack.pop();

        Ok(Sequence::new(commands?).boxed())
    }
}
