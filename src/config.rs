use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Manifest configuration, loaded once at startup from `files_config.yml`.
///
/// File order is significant: lookups that scan every manifest break ties
/// in favor of earlier entries.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Requirement manifests (`NAME==VERSION` per line).
    #[serde(default)]
    pub requirement_files: Vec<PathBuf>,
    /// Task-list manifests edited line-wise by the reflector.
    #[serde(default)]
    pub yml_files: Vec<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config file {path} is not valid YAML: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}
