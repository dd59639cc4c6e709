//! TOML configuration file support.
//!
//! Settings that would otherwise be repeated on every invocation can live in
//! a config file:
//!
//! ```toml
//! # mzspeclib.toml
//! [convert]
//! pretty_json = true
//! compact_interpretations = false
//!
//! [validate]
//! profile = "silver"
//! ontology = "terms.json"
//! profiles_file = "lab-profiles.toml"
//!
//! [index]
//! rebuild_if_stale = true
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure for mzspeclib.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Convert command settings.
    #[serde(default)]
    pub convert: ConvertConfig,

    /// Validate command settings.
    #[serde(default)]
    pub validate: ValidateConfig,

    /// Index settings, used by `index` and `describe --key`.
    #[serde(default)]
    pub index: IndexSettings,
}

/// Configuration for the convert command.
#[derive(Debug, Default, Deserialize)]
pub struct ConvertConfig {
    /// Indent JSON output.
    pub pretty_json: Option<bool>,

    /// Fold sole interpretation members into their interpretation in text output.
    pub compact_interpretations: Option<bool>,
}

/// Configuration for the validate command.
#[derive(Debug, Default, Deserialize)]
pub struct ValidateConfig {
    /// Profile to validate against.
    pub profile: Option<String>,

    /// JSON term table merged over the built-in terms.
    pub ontology: Option<PathBuf>,

    /// Extra profile definitions.
    pub profiles_file: Option<PathBuf>,
}

/// Index reuse settings.
#[derive(Debug, Default, Deserialize)]
pub struct IndexSettings {
    /// Rebuild a saved index whose source changed.
    pub rebuild_if_stale: Option<bool>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}
