//! # Schema Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file (or no file) yields a working configuration.
//!
//! ```toml
//! schema_version = "1.0.0"
//!
//! [metadata]
//! default_order = "descending"
//! max_values_per_record = 256
//!
//! [validation]
//! max_scene_depth = 64
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vworld_shared::DEFAULT_SCHEMA_VERSION;

use crate::metadata::SortOrder;

/// Errors while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Metadata store settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Ordering of records sharing a key when the caller does not choose.
    pub default_order: SortOrder,
    /// Upper bound on the length of a record's value array.
    pub max_values_per_record: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            default_order: SortOrder::Ascending,
            max_values_per_record: 1024,
        }
    }
}

/// Validation limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Longest Node chain walked while checking for cycles.
    pub max_scene_depth: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_scene_depth: 256,
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Tag stamped onto records created without one.
    pub schema_version: String,
    /// Metadata store settings.
    pub metadata: MetadataConfig,
    /// Validation limits.
    pub validation: ValidationConfig,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            metadata: MetadataConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl SchemaConfig {
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
        if self.schema_version.trim().is_empty() {
            return Err(ConfigError::Invalid("schema_version must not be empty".into()));
        }
        if self.metadata.max_values_per_record == 0 {
            return Err(ConfigError::Invalid(
                "metadata.max_values_per_record must be at least 1".into(),
            ));
        }
        if self.validation.max_scene_depth == 0 {
            return Err(ConfigError::Invalid(
                "validation.max_scene_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = SchemaConfig::from_toml_str("").unwrap();
        assert_eq!(config, SchemaConfig::default());
        assert_eq!(config.schema_version, "1.0.0");
        assert_eq!(config.metadata.default_order, SortOrder::Ascending);
    }

    #[test]
    fn test_partial_override() {
        let config = SchemaConfig::from_toml_str(
            r#"
            [metadata]
            default_order = "descending"

            [validation]
            max_scene_depth = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.metadata.default_order, SortOrder::Descending);
        assert_eq!(config.metadata.max_values_per_record, 1024);
        assert_eq!(config.validation.max_scene_depth, 8);
    }

    #[test]
    fn test_rejects_zero_limits() {
        let err = SchemaConfig::from_toml_str("[validation]\nmax_scene_depth = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_order() {
        let err =
            SchemaConfig::from_toml_str("[metadata]\ndefault_order = \"random\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = SchemaConfig::load("/nonexistent/vworld.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
