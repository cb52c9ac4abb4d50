//! Reading, hashing and validating a configuration file.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::resolve::{resolve_config_path, ConfigSource};
use crate::settings::Settings;
use crate::validate::{validate_settings, ValidationError};

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No config file found (tried --config, LOS_CONFIG, ./config.yaml, XDG config dir)")]
    NoConfigFile,

    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl ConfigError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::NoConfigFile => 10,
            ConfigError::NotFound { .. } => 11,
            ConfigError::IoError { .. } => 12,
            ConfigError::ParseError { .. } => 13,
            ConfigError::ValidationError(e) => e.code(),
        }
    }
}

/// Validated settings with provenance information.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub settings: Settings,
    pub path: PathBuf,
    pub source: ConfigSource,
    /// SHA-256 of the file content, hex encoded.
    pub hash: String,
}

/// Resolve, read and validate the configuration.
pub fn load_config(cli_path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let (path, source) = resolve_config_path(cli_path).ok_or(ConfigError::NoConfigFile)?;
    let (settings, hash) = load_settings(&path)?;
    Ok(LoadedConfig {
        settings,
        path,
        source,
        hash,
    })
}

/// Read, parse and validate settings from a specific file.
///
/// Returns the settings and the content hash.
pub fn load_settings(path: &Path) -> Result<(Settings, String), ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let hash = compute_hash(&content);

    let settings = Settings::from_yaml_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate_settings(&settings)?;

    Ok((settings, hash))
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_is_stable() {
        let a = compute_hash("sessions: []");
        assert_eq!(a, compute_hash("sessions: []"));
        assert_ne!(a, compute_hash("sessions: [ ]"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ConfigError::NoConfigFile.code(), 10);
        let nf = ConfigError::NotFound {
            path: PathBuf::from("x"),
        };
        assert_eq!(nf.code(), 11);
        let v = ConfigError::from(ValidationError::MissingField("sessions".into()));
        assert_eq!(v.code(), 64);
    }
}
