//! API key checks for submissions

use std::collections::HashMap;

use thiserror::Error;

use crate::config::Config;

/// A known API key and the name its metrics are tagged with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub key: String,
    pub shortname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyRejection {
    #[error("no API key supplied")]
    Missing,
    #[error("unknown API key")]
    Unknown,
}

pub trait ApiKeyCheck: Send + Sync {
    fn check(&self, key: Option<&str>) -> Result<ApiKey, KeyRejection>;
}

/// Static registry built from the `[api_keys]` configuration section
#[derive(Debug, Clone, Default)]
pub struct ApiKeyRegistry {
    keys: HashMap<String, ApiKey>,
}

impl ApiKeyRegistry {
    pub fn from_config(config: &Config) -> Self {
        let keys = config
            .api_keys
            .iter()
            .map(|(key, key_config)| {
                let shortname = key_config.shortname.clone().unwrap_or_else(|| key.clone());
                (
                    key.clone(),
                    ApiKey {
                        key: key.clone(),
                        shortname,
                    },
                )
            })
            .collect();

        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl ApiKeyCheck for ApiKeyRegistry {
    fn check(&self, key: Option<&str>) -> Result<ApiKey, KeyRejection> {
        let key = key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(KeyRejection::Missing)?;

        self.keys.get(key).cloned().ok_or(KeyRejection::Unknown)
    }
}
