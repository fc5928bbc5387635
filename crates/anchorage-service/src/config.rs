//! Aggregated configuration for the storage service.

use anchorage_client::ClientConfig;
use anchorage_maintenance::MaintenanceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration failure while loading a [`ServiceConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}")]
    Read {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config file {path}")]
    Parse {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying parse failure
        #[source]
        source: toml::de::Error,
    },
}

/// Component configs for the whole service, one TOML document.
///
/// Every section is optional; omitted sections take their defaults, so
/// an empty file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Storage client settings
    #[serde(default)]
    pub client: ClientConfig,
    /// Maintenance sweep settings
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

impl ServiceConfig {
    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }
}
