use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Accepted API keys, keyed by the value clients send as `?key=`
    #[serde(default)]
    pub api_keys: HashMap<String, ApiKeyConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Limit on the decoded request body
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_payload_bytes() -> usize {
    5 * 1024 * 1024 // 5 MB
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    /// Name used in metric tags; falls back to the key itself
    pub shortname: Option<String>,
}

/// Observation store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Fjall,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/observations")
}

/// Export object store provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportProvider {
    #[default]
    Memory,
    Local,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub provider: ExportProvider,
    /// Root directory for the local provider
    #[serde(default = "default_export_root")]
    pub root: PathBuf,
    #[serde(default = "default_export_prefix")]
    pub prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: ExportProvider::default(),
            root: default_export_root(),
            prefix: default_export_prefix(),
        }
    }
}

fn default_export_root() -> PathBuf {
    PathBuf::from("data/export")
}

fn default_export_prefix() -> String {
    "geosubmit".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            api_keys: HashMap::new(),
            storage: StorageConfig::default(),
            export: ExportConfig::default(),
        }
    }
}
