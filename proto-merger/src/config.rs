//! YAML options of a merge.
//!
//! ```yaml
//! main_proto: api/service.proto
//! additional_message:
//!   - pkg.Audit
//! additional_enum: []
//! omit_package_name: pkg
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MergeOptions {
    /// Name of the root file, as known to the descriptor set.
    pub main_proto: String,
    /// Full names of messages to emit even when nothing references them.
    #[serde(default)]
    pub additional_message: Vec<String>,
    #[serde(default)]
    pub additional_enum: Vec<String>,
    /// Package prefix dropped from every emitted type name.
    #[serde(default)]
    pub omit_package_name: String,
}

impl MergeOptions {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }
}
