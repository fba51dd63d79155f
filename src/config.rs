//! Runtime configuration for a [`crate::ReflectContext`].

use reflecta_cache::{CacheStrategy, DEFAULT_TEMPORARY_CAPACITY, LockStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LOCK_STRATEGY_ENV: &str = "REFLECTA_LOCK_STRATEGY";
pub const RETENTION_ENV: &str = "REFLECTA_RETENTION";
pub const TEMPORARY_CAPACITY_ENV: &str = "REFLECTA_TEMPORARY_CAPACITY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[cfg(feature = "toml-config")]
    #[error("failed to read config file `{path}`: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "toml-config")]
    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectConfig {
    /// Lock guarding the delegate cache.
    pub lock_strategy: LockStrategy,
    /// Retention used by the `delegate_for_*` entry points.
    pub default_retention: CacheStrategy,
    /// How many temporary thunks stay pinned before older ones become
    /// reclaimable.
    pub temporary_capacity: usize,
}

impl Default for ReflectConfig {
    fn default() -> Self {
        Self {
            lock_strategy: LockStrategy::ReaderWriter,
            default_retention: CacheStrategy::Temporary,
            temporary_capacity: DEFAULT_TEMPORARY_CAPACITY,
        }
    }
}

impl ReflectConfig {
    /// Defaults overridden by the `REFLECTA_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides read through `lookup`, which maps a variable name to
    /// its value.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(LOCK_STRATEGY_ENV) {
            self.lock_strategy = value
                .parse()
                .map_err(|reason| invalid(LOCK_STRATEGY_ENV, &value, reason))?;
        }
        if let Some(value) = lookup(RETENTION_ENV) {
            self.default_retention = value
                .parse()
                .map_err(|reason| invalid(RETENTION_ENV, &value, reason))?;
        }
        if let Some(value) = lookup(TEMPORARY_CAPACITY_ENV) {
            self.temporary_capacity = value
                .trim()
                .parse()
                .map_err(|err: std::num::ParseIntError| {
                    invalid(TEMPORARY_CAPACITY_ENV, &value, err.to_string())
                })?;
        }
        Ok(())
    }

    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    #[cfg(feature = "toml-config")]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

fn invalid(key: &'static str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    }
}
