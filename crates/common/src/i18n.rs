//! Localization
//!
//! A localization file names the OCR language and maps keys to the
//! strings an installer shows in that language:
//!
//! ```yaml
//! tesseract: deu
//! keymap: en_US
//! values:
//!   login: "Anmelden"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Localization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localization {
    /// Tesseract language code used for OCR
    pub tesseract: String,

    /// Keyboard layout name, `en_US` when absent
    #[serde(default)]
    pub keymap: Option<String>,

    #[serde(default)]
    pub values: HashMap<String, String>,
}

impl Default for Localization {
    fn default() -> Self {
        Self {
            tesseract: "eng".to_string(),
            keymap: None,
            values: HashMap::new(),
        }
    }
}

impl Localization {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Find `i18n/<language>.yaml` (or `.yml`) in `start` or any of its ancestors
    pub fn discover(start: &Path, language: &str) -> Option<PathBuf> {
        start.ancestors().find_map(|dir| {
            ["yaml", "yml"]
                .iter()
                .map(|ext| dir.join("i18n").join(format!("{}.{}", language, ext)))
                .find(|p| p.is_file())
        })
    }

    pub fn lookup(&self, key: &str) -> Result<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingLocalization(key.to_string()))
    }

    pub fn ocr_language(&self) -> &str {
        &self.tesseract
    }
}

/// Text that is either given literally or looked up in the localization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phrase {
    Literal(String),
    Key(String),
}

impl Phrase {
    pub fn resolve<'a>(&'a self, localization: &'a Localization) -> Result<&'a str> {
        match self {
            Phrase::Literal(text) => Ok(text.as_str()),
            Phrase::Key(key) => localization.lookup(key),
        }
    }
}

impl From<&str> for Phrase {
    fn from(text: &str) -> Self {
        Phrase::Literal(text.to_string())
    }
}

impl From<String> for Phrase {
    fn from(text: String) -> Self {
        Phrase::Literal(text)
    }
}

impl std::fmt::Display for Phrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phrase::Literal(text) => write!(f, "{:?}", text),
            Phrase::Key(key) => write!(f, "i18n({})", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DE: &str = r#"
tesseract: deu
values:
  login: "Anmelden"
  motd: "Willkommen"
"#;

    #[test]
    fn test_parse_localization() {
        let l10n = Localization::from_yaml(DE).unwrap();
        assert_eq!(l10n.ocr_language(), "deu");
        assert_eq!(l10n.lookup("login").unwrap(), "Anmelden");
        assert!(l10n.keymap.is_none());
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let l10n = Localization::default();
        let err = l10n.lookup("login").unwrap_err();
        assert!(matches!(err, Error::MissingLocalization(ref k) if k == "login"));
        assert!(!err.is_failure());
    }

    #[test]
    fn test_phrase_resolve() {
        let l10n = Localization::from_yaml(DE).unwrap();
        assert_eq!(Phrase::from("Solus").resolve(&l10n).unwrap(), "Solus");
        assert_eq!(
            Phrase::Key("motd".to_string()).resolve(&l10n).unwrap(),
            "Willkommen"
        );
        assert_eq!(Phrase::Key("motd".to_string()).to_string(), "i18n(motd)");
    }

    #[test]
    fn test_discover_walks_up() {
        let root = tempfile::tempdir().unwrap();
        let i18n = root.path().join("i18n");
        std::fs::create_dir_all(&i18n).unwrap();
        std::fs::write(i18n.join("de_DE.yml"), DE).unwrap();

        let nested = root.path().join("testcases").join("solus").join("4.6");
        std::fs::create_dir_all(&nested).unwrap();

        let found = Localization::discover(&nested, "de_DE").unwrap();
        assert_eq!(found, i18n.join("de_DE.yml"));
        assert!(Localization::discover(&nested, "fr_FR").is_none());
    }
}
