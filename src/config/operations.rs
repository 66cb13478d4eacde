//! Config loading, validation, and conversion.

use super::model::Config;
use crate::error::{Result, StockLockError};
use crate::lease::{LeaseSettings, TokenPolicy};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(StockLockError::ConfigError)` - Read, parse, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|e| {
            StockLockError::ConfigError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config if the file exists, otherwise use defaults.
    ///
    /// A file that exists but is invalid is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty map
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml).map_err(|e| {
            StockLockError::ConfigError(format!("failed to parse config YAML: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            StockLockError::ConfigError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Write the config to `path`, replacing any existing file.
    ///
    /// Content goes to a temp file in the same directory first and is then
    /// renamed over the target, so a reader never sees a partial file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = self.to_yaml()?;
        let temp_path = path.with_extension("yaml.tmp");

        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            file.write_all(yaml.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StockLockError::ConfigError(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `lease_retries` must be positive
    /// - `lease_ttl_ms` must be positive
    pub fn validate(&self) -> Result<()> {
        if self.lease_retries == 0 {
            return Err(StockLockError::ConfigError(
                "config validation failed: lease_retries must be greater than 0".to_string(),
            ));
        }

        if self.lease_ttl_ms == 0 {
            return Err(StockLockError::ConfigError(
                "config validation failed: lease_ttl_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Settings for a [`LeaseManager`](crate::lease::LeaseManager).
    pub fn lease_settings(&self) -> LeaseSettings {
        LeaseSettings {
            retries: self.lease_retries,
            retry_delay: Duration::from_millis(self.lease_retry_delay_ms),
            ttl: Duration::from_millis(self.lease_ttl_ms),
            token_policy: if self.verify_token_on_delete {
                TokenPolicy::Verified
            } else {
                TokenPolicy::Unchecked
            },
        }
    }
}
