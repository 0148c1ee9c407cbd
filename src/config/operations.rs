//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{Result, TetherError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::time::Duration;

/// Upper bound on the lease length.
pub const MAX_LOCK_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            TetherError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a YAML file, using defaults if the file is absent.
    ///
    /// A present but invalid file is still an error.
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
        // An empty document deserializes as unit, not as an empty mapping.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| {
                TetherError::UserError(format!("failed to parse config YAML: {}", e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            TetherError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    pub fn validate(&self) -> Result<()> {
        if self.lock_ttl_seconds == 0 {
            return Err(invalid("lock_ttl_seconds must be greater than 0"));
        }

        if self.lock_ttl_seconds > MAX_LOCK_TTL_SECONDS {
            return Err(invalid(&format!(
                "lock_ttl_seconds must be at most {} (one year)",
                MAX_LOCK_TTL_SECONDS
            )));
        }

        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms must be greater than 0"));
        }

        if self.holder_env_var.trim().is_empty() {
            return Err(invalid("holder_env_var must be non-empty"));
        }

        for (name, path) in &self.documents {
            if name.is_empty() || name.contains('/') {
                return Err(invalid(&format!(
                    "document names must be non-empty and contain no '/' (found '{}')",
                    name
                )));
            }
            if path.trim().is_empty() {
                return Err(invalid(&format!("document '{}' has an empty path", name)));
            }
        }

        self.tracked_globset()?;
        Ok(())
    }

    /// Lease length for newly acquired locks.
    pub fn lock_ttl(&self) -> chrono::Duration {
        let secs = self.lock_ttl_seconds.min(MAX_LOCK_TTL_SECONDS);
        chrono::Duration::seconds(secs as i64)
    }

    /// Default acquire timeout.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Backoff between acquire attempts.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Compile `tracked_paths` into a matcher.
    pub fn tracked_globset(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in &self.tracked_paths {
            let glob = Glob::new(&pattern.replace('\\', "/")).map_err(|e| {
                invalid(&format!("invalid glob in tracked_paths: '{}' - {}", pattern, e))
            })?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| invalid(&format!("failed to compile tracked_paths globs: {}", e)))
    }
}

fn invalid(message: &str) -> TetherError {
    TetherError::UserError(format!("config validation failed: {}", message))
}
