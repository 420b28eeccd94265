//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::Form2JsonConfig;
use crate::config::validation::{normalize_config, validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load, normalize and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Form2JsonConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, normalize and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Form2JsonConfig, ConfigError> {
    let mut config: Form2JsonConfig = toml::from_str(content)?;

    normalize_config(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
