//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$TESSERA_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/tessera/config.toml`
//! 3. `~/.tessera/config.toml` (canonical write location)
//!
//! # Project Config
//!
//! Located at `tessera.toml` in the project (page shell) directory.
//!
//! # Validation
//!
//! Config values are validated after parsing: URLs must parse, manifest
//! sources must name exactly one of `path`/`url`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// [store]
/// path = "/home/me/.tessera/store.json"
///
/// [routing]
/// case_sensitive = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Durable store settings
    pub store: Option<StoreConfig>,

    /// Routing defaults
    pub routing: Option<RoutingConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(store) = &self.store {
            store.validate()?;
        }
        Ok(())
    }
}

/// Project configuration (one page shell).
///
/// # Example
///
/// ```toml
/// base_url = "https://shop.example.com/"
///
/// [manifest]
/// url = "https://shop.example.com/importmaps/imports.json"
///
/// [stylesheets]
/// path = "dist/importmaps/stylesheets.json"
///
/// [routing]
/// exact = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Base URL that relative specifiers and manifest paths resolve against
    pub base_url: Option<String>,

    /// Where the resolution table is read from
    pub manifest: Option<SourceConfig>,

    /// Where the stylesheet list is read from
    pub stylesheets: Option<SourceConfig>,

    /// Routing overrides for this project
    pub routing: Option<RoutingConfig>,
}

impl ProjectConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.base_url {
            Url::parse(base).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid base_url '{}': {}", base, e))
            })?;
        }

        if let Some(manifest) = &self.manifest {
            manifest.validate("manifest")?;
        }
        if let Some(stylesheets) = &self.stylesheets {
            stylesheets.validate("stylesheets")?;
        }

        Ok(())
    }
}

/// Durable store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Path of the JSON store file
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Validate the store configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "store.path cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Location of a JSON document: a local file or a URL, never both.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Local file path
    pub path: Option<PathBuf>,

    /// Remote URL (absolute, or relative to `base_url`)
    pub url: Option<String>,
}

impl SourceConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        match (&self.path, &self.url) {
            (Some(_), Some(_)) => Err(ConfigError::InvalidValue(format!(
                "[{}] must set either 'path' or 'url', not both",
                section
            ))),
            (None, None) => Err(ConfigError::InvalidValue(format!(
                "[{}] must set 'path' or 'url'",
                section
            ))),
            _ => Ok(()),
        }
    }
}

/// Route matching configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingConfig {
    /// Compare routes without lower-casing
    pub case_sensitive: Option<bool>,

    /// Require exact route matches instead of prefix matches
    pub exact: Option<bool>,
}
