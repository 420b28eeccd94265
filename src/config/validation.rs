//! Configuration validation.
//!
//! # Responsibilities
//! - Normalize limits (non-positive memory limit → default)
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: &Form2JsonConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, on start and on reload

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::uri::Authority;

use crate::config::schema::Form2JsonConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Replace unusable limits with their defaults.
pub fn normalize_config(config: &mut Form2JsonConfig) {
    config.form = std::mem::take(&mut config.form).normalized();
}

/// Check a (normalized) configuration.
pub fn validate_config(config: &Form2JsonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if let Some(addr) = &config.upstream.address {
        if Authority::from_str(addr).is_err() {
            errors.push(ValidationError::new(
                "upstream.address",
                format!("`{}` is not a host:port authority", addr),
            ));
        }
    }

    if let Some(dir) = &config.form.temp_dir {
        if !dir.is_dir() {
            errors.push(ValidationError::new(
                "form.temp_dir",
                format!("`{}` is not a directory", dir.display()),
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("`{}` is not one of {:?}", config.observability.log_level, LOG_LEVELS),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{DEFAULT_MAX_FORM_SIZE, DEFAULT_MEMORY_LIMIT};

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&Form2JsonConfig::default()), Ok(()));
    }

    #[test]
    fn test_normalize_keeps_positive_limit() {
        let mut config = Form2JsonConfig::default();
        config.form.memory_limit = 10;
        normalize_config(&mut config);
        assert_eq!(config.form.memory_limit, 10);

        config.form.memory_limit = -100;
        config.form.max_form_size = 0;
        normalize_config(&mut config);
        assert_eq!(config.form.memory_limit, DEFAULT_MEMORY_LIMIT);
        assert_eq!(config.form.max_form_size, DEFAULT_MAX_FORM_SIZE);
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config = Form2JsonConfig::default();
        config.timeouts.request_secs = 0;
        config.observability.log_level = "loud".into();
        config.form.temp_dir = Some("/definitely/not/a/dir".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["form.temp_dir", "timeouts.request_secs", "observability.log_level"]);
    }

    #[test]
    fn test_upstream_must_be_authority() {
        let mut config = Form2JsonConfig::default();
        config.upstream.address = Some("127.0.0.1:3000".into());
        assert!(validate_config(&config).is_ok());

        config.upstream.address = Some("http://127.0.0.1:3000/path".into());
        assert!(validate_config(&config).is_err());
    }
}
