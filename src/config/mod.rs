//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (normalize limits, semantic checks)
//!     → Form2JsonConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → server swaps the converter's form limits
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Non-positive memory limits are normalized to the default, not rejected
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    Form2JsonConfig, FormConfig, ListenerConfig, ObservabilityConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::{normalize_config, validate_config, ValidationError};
