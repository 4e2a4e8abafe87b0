//! Configuration management for geosubmit
//!
//! Settings are layered from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use geosubmit::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Any setting can be overridden with `GEOSUBMIT__<section>__<key>`:
//! - `GEOSUBMIT__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `GEOSUBMIT__STORAGE__BACKEND=fjall`
//! - `GEOSUBMIT__EXPORT__ENABLED=true`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/geosubmit.toml`.
//! This can be overridden using the `GEOSUBMIT_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    ApiKeyConfig, Config, ExportConfig, ExportProvider, ServerConfig, StorageBackend,
    StorageConfig,
};
pub use validation::{MAX_PAYLOAD_LIMIT, ValidationError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
