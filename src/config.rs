//! Hub configuration.
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) gives a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runtime::route::DEFAULT_ORG_SIGIL;
use crate::runtime::scheduler::{SchedulerConfig, DEFAULT_REVALIDATE_AFTER};
use crate::store::catalog::DEFAULT_METADATA_FILE;

/// Longest accepted freshness window: one year.
pub const MAX_REVALIDATE_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Directory holding one `{org}/{slug}` directory per block.
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,

    /// Seconds a built page stays fresh.
    #[serde(default = "default_revalidate_secs")]
    pub revalidate_secs: u64,

    /// Required first character of every org shortname.
    #[serde(default = "default_org_sigil")]
    pub org_sigil: char,

    /// Descriptor file name inside each block directory.
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,

    /// Default log filter, overridden by `--log-level`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            content_root: default_content_root(),
            revalidate_secs: default_revalidate_secs(),
            org_sigil: default_org_sigil(),
            metadata_file: default_metadata_file(),
            log_level: default_log_level(),
        }
    }
}

impl HubConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a field is out of range.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.revalidate_secs > MAX_REVALIDATE_SECS {
            return Err(ConfigError::Validation(format!(
                "revalidate_secs must be at most {}, got {}",
                MAX_REVALIDATE_SECS, self.revalidate_secs
            )));
        }
        if self.metadata_file.is_empty() || self.metadata_file.contains(['/', '\\']) {
            return Err(ConfigError::Validation(format!(
                "metadata_file must be a plain file name, got '{}'",
                self.metadata_file
            )));
        }
        if self.org_sigil == '/' || self.org_sigil.is_whitespace() {
            return Err(ConfigError::Validation(format!(
                "org_sigil '{}' cannot start a path segment",
                self.org_sigil
            )));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            revalidate_after: Duration::from_secs(self.revalidate_secs),
            org_sigil: self.org_sigil,
            metadata_file: self.metadata_file.clone(),
        }
    }
}

fn default_content_root() -> PathBuf {
    PathBuf::from("blocks")
}

const fn default_revalidate_secs() -> u64 {
    DEFAULT_REVALIDATE_AFTER.as_secs()
}

const fn default_org_sigil() -> char {
    DEFAULT_ORG_SIGIL
}

fn default_metadata_file() -> String {
    DEFAULT_METADATA_FILE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
