//! Realtime settings, loaded from TOML like the schema configuration.
//!
//! ```toml
//! stale_after_ms = 15000
//! inbox_capacity = 4096
//! ```

use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use vworld_schema::config::{ConfigError, ConfigResult};

/// Presence and inbox settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Agents silent for longer than this are pruned.
    pub stale_after_ms: u64,
    /// Frames buffered before publishers see back-pressure.
    pub inbox_capacity: usize,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: 30_000,
            inbox_capacity: 1024,
        }
    }
}

impl PresenceConfig {
    /// Stale window as a duration.
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.stale_after_ms).unwrap_or(i64::MAX))
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `Parse` on malformed TOML, `Invalid` on out-of-range values.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise as [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// `Invalid` naming the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.stale_after_ms == 0 {
            return Err(ConfigError::Invalid("stale_after_ms must be at least 1".into()));
        }
        if self.stale_after_ms > u64::from(u32::MAX) {
            return Err(ConfigError::Invalid("stale_after_ms is unreasonably large".into()));
        }
        if self.inbox_capacity == 0 {
            return Err(ConfigError::Invalid("inbox_capacity must be at least 1".into()));
        }
        Ok(())
    }
}
