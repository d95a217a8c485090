//! QuickEmu VM configuration files

use std::path::Path;
use tokio::io::AsyncWriteExt;

use vmtest_common::{Geometry, Result};

/// First line of a generated config
pub const SHEBANG: &str = "#!/usr/bin/quickemu --vm";

/// Marks options appended to a config downloaded by quickget
pub const APPENDED_MARKER: &str = "# Options added by vmtest";

/// Prefix of environment variables overriding config options
pub const ENV_PREFIX: &str = "VM_";

/// Ordered `key="value"` options of a QuickEmu config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuickEmuConfig {
    options: Vec<(String, String)>,
}

impl QuickEmuConfig {
    /// Complete config for a VM whose ISO and disk live in `<name>/`
    pub fn full(name: &str, geometry: Geometry) -> Self {
        let mut config = Self::display(geometry);
        config.set("firmware", "efi");
        config.set("guest_os", "linux");
        config.set("iso", format!("{}/{}.iso", name, name));
        config.set("disk_img", format!("{}/disk.qcow2", name));
        config
    }

    /// Display options only, appended to a quickget config
    pub fn display(geometry: Geometry) -> Self {
        let mut config = Self::default();
        config.set("display", "spice");
        config.set("width", geometry.width.to_string());
        config.set("height", geometry.height.to_string());
        config
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an option, keeping its original position when it already exists
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.options.iter_mut().find(|(k, _)| *k == key) {
            Some(option) => option.1 = value,
            None => self.options.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.options.iter().position(|(k, _)| k == key)?;
        Some(self.options.remove(index).1)
    }

    /// Apply `VM_*` overrides and return the extra quickemu arguments.
    ///
    /// `VM_DISPLAY=sdl` sets `display="sdl"`; `VM_VM_OPTS` is not written to
    /// the config but split on spaces into command line arguments.
    pub fn apply_env<I>(&mut self, vars: I) -> Vec<String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(option) = key.strip_prefix(ENV_PREFIX) {
                self.set(option.to_lowercase(), value);
            }
        }

        self.remove("vm_opts")
            .map(|opts| opts.split(' ').filter(|o| !o.is_empty()).map(String::from).collect())
            .unwrap_or_default()
    }

    /// Option lines, one `key="value"` per line
    pub fn lines(&self) -> String {
        self.options
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"\n", k, v))
            .collect()
    }

    pub fn render(&self) -> String {
        format!("{}\n{}", SHEBANG, self.lines())
    }

    pub async fn write(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.render()).await?;
        Ok(())
    }

    /// Append the options to an existing config
    pub async fn append(&self, path: &Path) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        file.write_all(format!("{}\n{}", APPENDED_MARKER, self.lines()).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }
}
