//! Keyboard layouts
//!
//! A [`Keymap`] translates logical keys (single characters or names such as
//! `"return"`) into the key-combo tokens understood by the monitor's
//! `sendkey` command. Mapping never fails: unmapped uppercase letters become
//! `shift-<lowercase>` and anything else is passed through unchanged.

use std::collections::HashMap;

/// Mapping of logical keys to monitor `sendkey` tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    name: String,
    mapping: HashMap<String, String>,
}

const EN_US: &[(&str, &str)] = &[
    ("`", "grave"),
    ("~", "shift-grave"),
    ("!", "shift-1"),
    ("@", "shift-2"),
    ("#", "shift-3"),
    ("$", "shift-4"),
    ("%", "shift-5"),
    ("^", "shift-6"),
    ("&", "shift-7"),
    ("*", "shift-8"),
    ("(", "shift-9"),
    (")", "shift-0"),
    ("-", "minus"),
    ("_", "shift-minus"),
    ("=", "equal"),
    ("+", "shift-equal"),
    ("[", "bracketleft"),
    ("{", "shift-bracketleft"),
    ("]", "bracketright"),
    ("}", "shift-bracketright"),
    ("\\", "backslash"),
    ("|", "shift-backslash"),
    (";", "semicolon"),
    (":", "shift-semicolon"),
    ("'", "apostrophe"),
    ("\"", "shift-apostrophe"),
    (",", "comma"),
    ("<", "shift-comma"),
    (">", "shift-dot"),
    ("/", "slash"),
    ("?", "shift-slash"),
    (".", "dot"),
    (" ", "spc"),
    ("space", "spc"),
    ("enter", "ret"),
    ("return", "ret"),
    ("\n", "ret"),
    ("escape", "esc"),
    ("esc", "esc"),
    ("tab", "tab"),
    ("\t", "tab"),
];

impl Keymap {
    pub fn new(name: impl Into<String>, mapping: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            mapping,
        }
    }

    /// US English layout
    pub fn en_us() -> Self {
        let mapping = EN_US
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new("en_US", mapping)
    }

    /// Look up a built-in layout by name
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "en_US" | "en_us" | "us" => Some(Self::en_us()),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token to send for a logical key
    pub fn map(&self, key: &str) -> String {
        if let Some(token) = self.mapping.get(key) {
            return token.clone();
        }

        if is_upper(key) {
            return format!("shift-{}", key.to_lowercase());
        }

        key.to_string()
    }

    /// Logical key a token was produced from.
    ///
    /// Single-character keys win over named keys, so `ret` recovers `"\n"`.
    pub fn unmap(&self, token: &str) -> String {
        let mut candidates: Vec<&String> = self
            .mapping
            .iter()
            .filter(|(_, v)| v.as_str() == token)
            .map(|(k, _)| k)
            .collect();
        candidates.sort_by_key(|k| (k.chars().count(), k.as_str()));
        if let Some(key) = candidates.first() {
            return key.to_string();
        }

        if let Some(letter) = token.strip_prefix("shift-") {
            if letter.chars().count() == 1 && !is_upper(letter) {
                let upper = letter.to_uppercase();
                if is_upper(&upper) {
                    return upper;
                }
            }
        }

        token.to_string()
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::en_us()
    }
}

// At least one cased character and no lowercase ones.
fn is_upper(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}
