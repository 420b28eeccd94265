//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::form::{DEFAULT_MAX_FORM_SIZE, DEFAULT_MEMORY_LIMIT};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Form2JsonConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Form decoding limits.
    pub form: FormConfig,

    /// Where converted requests go next.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Form decoding configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FormConfig {
    /// Maximum bytes of uploaded file content held in memory while decoding.
    /// Files past this budget are written to temporary files.
    /// Non-positive values are replaced by the 2 MiB default.
    pub memory_limit: i64,

    /// Maximum size of an urlencoded body in bytes.
    pub max_form_size: usize,

    /// Directory for spilled files (OS temp dir when unset).
    pub temp_dir: Option<PathBuf>,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            max_form_size: DEFAULT_MAX_FORM_SIZE,
            temp_dir: None,
        }
    }
}

impl FormConfig {
    /// Replace unusable limits with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.memory_limit <= 0 {
            tracing::debug!(
                configured = self.memory_limit,
                default = DEFAULT_MEMORY_LIMIT,
                "Non-positive memory limit, using default"
            );
            self.memory_limit = DEFAULT_MEMORY_LIMIT;
        }
        if self.max_form_size == 0 {
            self.max_form_size = DEFAULT_MAX_FORM_SIZE;
        }
        self
    }

    /// In-memory file budget in bytes; zero if the limit was never normalized.
    pub fn memory_budget(&self) -> u64 {
        u64::try_from(self.memory_limit).unwrap_or(0)
    }
}

/// Next pipeline stage.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000"). Converted requests are
    /// echoed back to the client when unset.
    pub address: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
