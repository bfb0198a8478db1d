use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Where and how records are laid out on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Storage root; relative roots resolve against the working directory.
    pub root: PathBuf,
    /// File extension for text-backend records.
    pub text_extension: String,
    /// File extension for binary-backend records.
    pub binary_extension: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            text_extension: "json".into(),
            binary_extension: "bin".into(),
        }
    }
}

impl StoreConfig {
    /// Default layout under a specific root.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.root.as_os_str().is_empty() {
            return Err(StoreError::Config("root must not be empty".into()));
        }
        for (key, ext) in [
            ("text_extension", &self.text_extension),
            ("binary_extension", &self.binary_extension),
        ] {
            if ext.is_empty() || ext.contains(['/', '\\', '.']) {
                return Err(StoreError::Config(format!("invalid {key}: {ext:?}")));
            }
        }
        if self.text_extension == self.binary_extension {
            return Err(StoreError::Config(
                "text and binary extensions must differ".into(),
            ));
        }
        Ok(())
    }

    /// The root as an absolute path.
    pub fn absolute_root(&self) -> StoreResult<PathBuf> {
        if self.root.is_absolute() {
            return Ok(self.root.clone());
        }
        Ok(std::env::current_dir()?.join(&self.root))
    }
}
