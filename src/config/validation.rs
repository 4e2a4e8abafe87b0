use super::models::{Config, ExportProvider};
use thiserror::Error;

/// Upper bound for `server.max_payload_bytes`
pub const MAX_PAYLOAD_LIMIT: usize = 20 * 1024 * 1024; // 20 MB

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No API keys configured (at least one [api_keys.<key>] section is required)")]
    NoApiKeys,

    #[error("API key '{key}' has an empty shortname")]
    EmptyShortname { key: String },

    #[error("max_payload_bytes must be between 1 and {limit}, got {actual}")]
    InvalidPayloadLimit { actual: usize, limit: usize },

    #[error("Export prefix must not be empty")]
    EmptyExportPrefix,

    #[error("Local export requires a non-empty root directory")]
    InvalidExportRoot,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_api_keys(config)?;
    validate_payload_limit(config)?;
    validate_export(config)?;
    Ok(())
}

fn validate_api_keys(config: &Config) -> Result<(), ValidationError> {
    if config.api_keys.is_empty() {
        return Err(ValidationError::NoApiKeys);
    }

    for (key, key_config) in &config.api_keys {
        if key_config
            .shortname
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(ValidationError::EmptyShortname { key: key.clone() });
        }
    }

    Ok(())
}

fn validate_payload_limit(config: &Config) -> Result<(), ValidationError> {
    let actual = config.server.max_payload_bytes;
    if actual == 0 || actual > MAX_PAYLOAD_LIMIT {
        return Err(ValidationError::InvalidPayloadLimit {
            actual,
            limit: MAX_PAYLOAD_LIMIT,
        });
    }

    Ok(())
}

/// Only checked when export is enabled
fn validate_export(config: &Config) -> Result<(), ValidationError> {
    let export = &config.export;
    if !export.enabled {
        return Ok(());
    }

    if export.prefix.trim().is_empty() {
        return Err(ValidationError::EmptyExportPrefix);
    }

    if export.provider == ExportProvider::Local && export.root.as_os_str().is_empty() {
        return Err(ValidationError::InvalidExportRoot);
    }

    Ok(())
}
