//! Test suites
//!
//! A suite file lists defaults and any number of suites; every suite
//! expands into the cartesian product of its tests, OSes, releases,
//! editions and environment variable values:
//!
//! ```yaml
//! default:
//!   test: install
//!   os: solus
//!   release: "4.6"
//!   env:
//!     SOLUS_FS: default
//! suites:
//!   - edition: [budgie, gnome]
//!     env:
//!       SOLUS_FS: [btrfs, ext4]
//!       VM_FIRMWARE: [efi, legacy]
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use regex::{Captures, Regex};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::testcase;

/// Environment variables of a test
pub type Env = BTreeMap<String, String>;

/// Prefix of variables that configure vmtest itself
pub const VMTEST_PREFIX: &str = "VMTEST_";

/// Format of timestamps in output directory names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

fn variable_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"\$(?:(\$)|([A-Za-z_][A-Za-z0-9_]*)|\{([A-Za-z_][A-Za-z0-9_]*)\})").ok()
        })
        .as_ref()
}

/// Replace `$VAR` and `${VAR}` using `lookup`; unknown variables are left
/// as they are and `$$` becomes `$`
pub fn substitute_with<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let Some(pattern) = variable_pattern() else {
        return s.to_string();
    };

    pattern
        .replace_all(s, |caps: &Captures| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
            name.and_then(&lookup)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Replace variables with values from the process environment
pub fn substitute(s: &str) -> String {
    substitute_with(s, |name| std::env::var(name).ok())
}

/// Interpret a flag value like `1`, `true`, `yes` or `on`
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" | "" => Some(false),
        _ => None,
    }
}

/// One test to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Test {
    pub name: String,
    pub os: String,
    pub release: String,
    pub edition: Option<String>,
    pub env: Env,
    pub timestamp: Option<DateTime<Local>>,
}

impl Test {
    pub fn new(name: &str, os: &str, release: &str, edition: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            os: os.to_string(),
            release: release.to_string(),
            edition: edition.filter(|e| !e.is_empty()).map(String::from),
            env: Env::new(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// `variant_<sha256>` identifying the environment, empty without one
    pub fn variant(&self) -> String {
        if self.env.is_empty() {
            return String::new();
        }

        let mut hasher = Sha256::new();
        for (key, value) in &self.env {
            hasher.update(format!("{}={}", key, value).as_bytes());
        }
        format!("variant_{}", hex::encode(hasher.finalize()))
    }

    /// Output directory of this test relative to `root`
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        let mut dir = root.join(&self.os).join(&self.release);
        if let Some(edition) = &self.edition {
            dir.push(edition);
        }
        let variant = self.variant();
        if !variant.is_empty() {
            dir.push(variant);
        }
        dir.push(&self.name);
        if let Some(ts) = &self.timestamp {
            dir.push(ts.format(TIMESTAMP_FORMAT).to_string());
        }
        dir
    }

    /// Environment with variables substituted from the process environment
    pub fn resolved_env(&self) -> Env {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), substitute(v)))
            .collect()
    }

    /// Arguments for `vmtest run`
    pub fn run_args(&self, testcase_dir: &Path, output_root: &Path) -> Result<Vec<String>> {
        let script = testcase::resolve(
            testcase_dir,
            &self.name,
            &self.os,
            &self.release,
            self.edition.as_deref(),
        )?;

        let mut args = vec![
            "run".to_string(),
            script.to_string_lossy().to_string(),
            self.os.clone(),
            self.release.clone(),
        ];
        args.extend(self.edition.clone());
        args.push("--output-dir".to_string());
        args.push(self.output_dir(output_root).to_string_lossy().to_string());
        Ok(args)
    }

    fn user_env(&self) -> Env {
        self.env
            .iter()
            .filter(|(k, _)| !k.starts_with(VMTEST_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Test({} {} {}", self.name, self.os, self.release)?;
        if let Some(edition) = &self.edition {
            write!(f, " {}", edition)?;
        }
        let env = self.user_env();
        if !env.is_empty() {
            write!(f, " (env: {})", env_string(&env, None))?;
        }
        write!(f, ")")
    }
}

/// `K=V; ...` for the variables of `env` that differ from `defaults`
pub fn env_string(env: &Env, defaults: Option<&Env>) -> String {
    env.iter()
        .filter(|(k, v)| defaults.and_then(|d| d.get(*k)) != Some(*v))
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Values used where a suite does not give any
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuiteDefaults {
    pub test: Option<String>,
    pub os: Option<String>,
    pub release: Option<String>,
    pub edition: Option<String>,
    #[serde(default)]
    pub env: Env,
}

/// One suite: lists of values to combine
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Suite {
    pub test: Option<Vec<String>>,
    pub os: Option<Vec<String>>,
    pub release: Option<Vec<String>>,
    pub edition: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub env: BTreeMap<String, Vec<String>>,
}

fn values(list: &Option<Vec<String>>, default: &Option<String>, what: &str) -> Result<Vec<String>> {
    match list {
        Some(list) if !list.is_empty() => Ok(list.clone()),
        _ => default
            .clone()
            .map(|d| vec![d])
            .with_context(|| format!("No {} given in suite or defaults", what)),
    }
}

impl Suite {
    /// Every combination of environment values, merged onto the defaults
    pub fn envs(&self, defaults: &Env) -> Vec<Env> {
        let mut envs = vec![defaults.clone()];
        for (key, values) in &self.env {
            envs = envs
                .iter()
                .flat_map(|env| {
                    values.iter().map(move |value| {
                        let mut env = env.clone();
                        env.insert(key.clone(), value.clone());
                        env
                    })
                })
                .collect();
        }
        envs
    }

    /// All tests covered by this suite
    pub fn tests(&self, defaults: &SuiteDefaults) -> Result<Vec<Test>> {
        let names = values(&self.test, &defaults.test, "test")?;
        let oses = values(&self.os, &defaults.os, "os")?;
        let releases = values(&self.release, &defaults.release, "release")?;
        let editions = match &self.edition {
            Some(list) if !list.is_empty() => list.clone(),
            _ => vec![defaults.edition.clone()],
        };
        let envs = self.envs(&defaults.env);

        let mut tests = Vec::new();
        for name in &names {
            for os in &oses {
                for release in &releases {
                    for edition in &editions {
                        for env in &envs {
                            let edition = edition.as_deref().map(substitute);
                            let mut test = Test::new(
                                &substitute(name),
                                &substitute(os),
                                &substitute(release),
                                edition.as_deref(),
                            );
                            test.env = env.clone();
                            tests.push(test);
                        }
                    }
                }
            }
        }
        Ok(tests)
    }
}

/// Contents of a suite file
#[derive(Debug, Clone, Deserialize)]
pub struct SuiteFile {
    #[serde(default)]
    pub default: SuiteDefaults,
    pub suites: Vec<Suite>,
}

impl SuiteFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Invalid suite file")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// All tests of all suites, in order
    pub fn tests(&self) -> Result<Vec<Test>> {
        let mut tests = Vec::new();
        for suite in &self.suites {
            tests.extend(suite.tests(&self.default)?);
        }
        Ok(tests)
    }

    /// Flag from the process environment, falling back to the defaults' env
    pub fn flag(&self, key: &str, default: bool) -> bool {
        std::env::var(key)
            .ok()
            .or_else(|| self.default.env.get(key).cloned())
            .and_then(|v| parse_flag(&v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "RELEASE" => Some("4.6".to_string()),
            "FS" => Some("btrfs".to_string()),
            _ => None,
        }
    }

    #[test_case("$RELEASE", "4.6" ; "plain")]
    #[test_case("solus-${RELEASE}-x", "solus-4.6-x" ; "braced")]
    #[test_case("$FS/$UNKNOWN", "btrfs/$UNKNOWN" ; "unknown kept")]
    #[test_case("cost: $$5", "cost: $5" ; "escaped dollar")]
    #[test_case("no variables", "no variables" ; "untouched")]
    fn test_substitute(input: &str, expected: &str) {
        assert_eq!(substitute_with(input, lookup), expected);
    }

    #[test_case("true", Some(true))]
    #[test_case("Yes", Some(true))]
    #[test_case("0", Some(false))]
    #[test_case("", Some(false))]
    #[test_case("maybe", None)]
    fn test_parse_flag(value: &str, expected: Option<bool>) {
        assert_eq!(parse_flag(value), expected);
    }

    #[test]
    fn test_output_dir() {
        let test = Test::new("install", "solus", "4.6", Some("budgie"));
        assert_eq!(
            test.output_dir(Path::new("results")),
            Path::new("results/solus/4.6/budgie/install")
        );

        let mut test = Test::new("boot_to_login", "alpine", "v3.19", Some(""));
        test.env.insert("VM_FIRMWARE".to_string(), "legacy".to_string());
        let dir = test.output_dir(Path::new("results"));
        let variant = dir.parent().unwrap().file_name().unwrap().to_string_lossy();
        assert!(variant.starts_with("variant_"));
        assert_eq!(variant.len(), "variant_".len() + 64);
        assert_eq!(dir.parent().unwrap().parent().unwrap(), Path::new("results/alpine/v3.19"));
    }

    #[test]
    fn test_display_hides_vmtest_env() {
        let mut test = Test::new("install", "solus", "4.6", None);
        assert_eq!(test.to_string(), "Test(install solus 4.6)");

        test.env.insert("SOLUS_FS".to_string(), "btrfs".to_string());
        test.env.insert("VMTEST_KEEP_VM".to_string(), "1".to_string());
        assert_eq!(test.to_string(), "Test(install solus 4.6 (env: SOLUS_FS=btrfs))");
    }

    #[test]
    fn test_env_string_skips_defaults() {
        let env: Env = [("A", "1"), ("B", "2")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let defaults: Env = [("A".to_string(), "1".to_string())].into_iter().collect();

        assert_eq!(env_string(&env, Some(&defaults)), "B=2");
        assert_eq!(env_string(&env, None), "A=1; B=2");
    }

    #[test]
    fn test_suite_expansion() {
        let file = SuiteFile::from_yaml(
            r#"
default:
  test: install
  os: solus
  release: "4.6"
  env:
    SOLUS_FS: default
suites:
  - edition: [budgie, gnome]
    env:
      SOLUS_FS: [btrfs, ext4]
      VM_FIRMWARE: [efi, legacy]
  - test: [boot_to_login]
    os: [alpine]
    release: [v3.19]
"#,
        )
        .unwrap();

        let tests = file.tests().unwrap();
        assert_eq!(tests.len(), 2 * 2 * 2 + 1);

        let first = &tests[0];
        assert_eq!(first.edition.as_deref(), Some("budgie"));
        assert_eq!(first.env.get("SOLUS_FS").map(String::as_str), Some("btrfs"));
        assert_eq!(first.env.get("VM_FIRMWARE").map(String::as_str), Some("efi"));

        let last = &tests[8];
        assert_eq!(last.name, "boot_to_login");
        assert_eq!(last.os, "alpine");
        assert_eq!(last.edition, None);
        assert_eq!(env_string(&last.env, Some(&file.default.env)), "");
    }

    #[test]
    fn test_suite_needs_test_name() {
        let file = SuiteFile::from_yaml("suites:\n  - os: [alpine]\n    release: [v3.19]\n").unwrap();
        let err = file.tests().unwrap_err();
        assert!(err.to_string().contains("No test given"));
    }

    #[test]
    fn test_null_edition_in_list() {
        let file = SuiteFile::from_yaml(
            "default: {test: install, os: solus, release: '4.6'}\nsuites:\n  - edition: [~, budgie]\n",
        )
        .unwrap();
        let editions: Vec<Option<String>> = file.tests().unwrap().into_iter().map(|t| t.edition).collect();
        assert_eq!(editions, [None, Some("budgie".to_string())]);
    }
}
