//! Scan configuration.
//!
//! Loaded from an explicit `--config` path or from `depgraph.toml` in the
//! scanned root. Every field has a default, so a partial file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CONFIG_FILENAME: &str = "depgraph.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepGraphConfig {
    pub scan: ScanConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Language names to scan. Empty means every registered language.
    pub languages: Vec<String>,
    pub respect_gitignore: bool,
    /// Files larger than this are skipped.
    pub max_file_bytes: u64,
    pub parallel: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            respect_gitignore: true,
            max_file_bytes: 2 * 1024 * 1024,
            parallel: true,
        }
    }
}

impl ScanConfig {
    pub fn allows_language(&self, name: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Attach `sig:body` fingerprints to every reported entity.
    pub include_hashes: bool,
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_hashes: false,
            pretty: true,
        }
    }
}

impl DepGraphConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads `depgraph.toml` from `root` when present, defaults otherwise.
    pub fn discover(root: &Path) -> Result<Self> {
        let path = Self::default_path(root);
        if path.is_file() {
            tracing::debug!("Loading config from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn default_path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILENAME)
    }
}
