//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Identity of the backing file at the moment it was read.
///
/// A reload happens only when this changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFingerprint {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl SourceFingerprint {
    pub fn of(path: &Path) -> Result<Self, ConfigError> {
        let meta = fs::metadata(path)?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
///
/// The fingerprint is taken before reading so a write racing with the read
/// is picked up by the next check rather than missed.
pub fn load_config(path: &Path) -> Result<(AppConfig, SourceFingerprint), ConfigError> {
    let fingerprint = SourceFingerprint::of(path)?;
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, fingerprint))
}
