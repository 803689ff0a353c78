//! Kernel configuration.
//!
//! All sections are optional in the JSON form; missing fields take their
//! defaults.
//!
//! ```json
//! {
//!   "contract": { "turn_tag": "ms-chat-turn" },
//!   "sync": { "mirror_attribute": "data-role" },
//!   "export": { "title": "Chat Export" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::export::ExportConfig;
use crate::policy::HostContract;
use crate::sync::SyncConfig;

/// Error loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Config text is not valid.
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A required marker is empty.
    #[error("Host contract field `{0}` must not be empty")]
    EmptyMarker(&'static str),
}

/// Complete kernel configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Structural markers of the host page.
    pub contract: HostContract,
    /// Sync controller settings.
    pub sync: SyncConfig,
    /// Export settings.
    pub export: ExportConfig,
}

impl KernelConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Reject contracts whose tag markers are empty.
    ///
    /// An empty tag would match nothing and silently classify nothing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.contract;
        let required = [
            ("turn_tag", &c.turn_tag),
            ("reasoning_tag", &c.reasoning_tag),
            ("content_tag", &c.content_tag),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyMarker(name));
            }
        }
        Ok(())
    }
}
