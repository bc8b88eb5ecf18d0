//! Global Configuration
//!
//! Settings shared by every workflow run, read from a YAML file.
//!
//! # Location
//!
//! The default file is resolved in the following order:
//! 1. `TOOLFLOW_CONFIG` environment variable
//! 2. `~/.toolflow/config.yaml`
//! 3. `.toolflow/config.yaml` in the current directory (no home directory)
//!
//! # Example
//!
//! ```yaml
//! vars:
//!   out_dir: ./output
//!   lang: en
//! max_workers: 4
//! program: toolbox
//! working_dir: /data/media
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::workflow::model::scalar_map;

/// Environment variable that overrides the default config location.
pub const CONFIG_ENV_VAR: &str = "TOOLFLOW_CONFIG";

/// Lazily-resolved path to the default configuration file.
pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(path);
        info!("Using config from {}: {}", CONFIG_ENV_VAR, path.display());
        return path;
    }

    match dirs::home_dir() {
        Some(home) => home.join(".toolflow").join("config.yaml"),
        None => {
            warn!("No home directory found; looking for config in current directory");
            PathBuf::from(".toolflow").join("config.yaml")
        }
    }
});

/// Global settings; every field is optional in the file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GlobalConfig {
    /// Lowest-precedence variables for every workflow
    #[serde(default, deserialize_with = "scalar_map")]
    pub vars: IndexMap<String, String>,

    /// Worker pool bound for parallel workflows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Host program that receives each step's arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    /// Working directory for dispatched commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl GlobalConfig {
    /// Loads the default config file.
    ///
    /// A missing file gives defaults. An unreadable or corrupt file is
    /// reported and also gives defaults.
    pub fn load() -> Self {
        let path = &*CONFIG_PATH;
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Self::default();
        }

        Self::load_from(path).unwrap_or_else(|e| {
            warn!("{}; using default configuration", e);
            Self::default()
        })
    }

    /// Loads an explicitly requested config file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: GlobalConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        info!(
            "Loaded config from {} ({} global variables)",
            path.display(),
            config.vars.len()
        );
        Ok(config)
    }
}
