//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Tessera has two configuration scopes:
//! - **Global**: User-level settings (durable store location, routing defaults)
//! - **Project**: Page-shell settings (base URL, manifest and stylesheet sources)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Project config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$TESSERA_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/tessera/config.toml`
//! 3. `~/.tessera/config.toml` (canonical write location)
//!
//! # Project Config Location
//!
//! `tessera.toml` in the project directory.
//!
//! # Example
//!
//! ```no_run
//! use tessera::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/shell"))).unwrap();
//! let config = result.config;
//!
//! println!("Base URL: {}", config.base_url());
//! println!("Case sensitive: {}", config.match_options().case_sensitive);
//! ```

pub mod schema;

pub use schema::{GlobalConfig, ProjectConfig, RoutingConfig, SourceConfig, StoreConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

use crate::core::route::MatchOptions;

/// Default base URL when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost/";

/// Fixed location of the resolution table relative to the base URL.
pub const DEFAULT_MANIFEST_PATH: &str = "/importmaps/imports.json";

/// Fixed location of the stylesheet list relative to the base URL.
pub const DEFAULT_STYLESHEETS_PATH: &str = "/importmaps/stylesheets.json";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "tessera.toml";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Where a JSON document should be read from, after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLocation {
    /// A file on disk.
    File(PathBuf),
    /// An absolute URL.
    Remote(Url),
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
}

/// Merged configuration from all sources.
///
/// Accessor methods apply precedence rules automatically: project config
/// overrides global config, which overrides defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Project configuration (if a project directory was given and has one)
    pub project: Option<ProjectConfig>,
    global_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl Config {
    /// Build a config directly from parsed parts.
    pub fn from_parts(global: GlobalConfig, project: Option<ProjectConfig>) -> Self {
        Self {
            global,
            project,
            global_path: None,
            project_path: None,
        }
    }

    /// Load configuration from default locations.
    ///
    /// If `project_dir` is provided, also loads `tessera.toml` from it.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or fail
    /// validation. Missing config files are not an error.
    pub fn load(project_dir: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let (global, global_path) = Self::load_global()?;

        let (project, project_path) = match project_dir {
            Some(dir) => Self::load_project(dir)?,
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                project,
                global_path,
                project_path,
            },
        })
    }

    /// Load configuration from an explicit global file plus optional project dir.
    ///
    /// Used when `--config` is passed on the command line.
    pub fn load_with_global(
        global_file: &Path,
        project_dir: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let global = Self::read_toml::<GlobalConfig>(global_file)?;
        let (project, project_path) = match project_dir {
            Some(dir) => Self::load_project(dir)?,
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                project,
                global_path: Some(global_file.to_path_buf()),
                project_path,
            },
        })
    }

    fn load_global() -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        if let Ok(path) = std::env::var("TESSERA_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                let config = Self::read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("tessera/config.toml");
            if path.exists() {
                let config = Self::read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".tessera/config.toml");
            if path.exists() {
                let config = Self::read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((GlobalConfig::default(), None))
    }

    fn load_project(dir: &Path) -> Result<(Option<ProjectConfig>, Option<PathBuf>), ConfigError> {
        let path = dir.join(PROJECT_CONFIG_FILE);
        if !path.exists() {
            return Ok((None, None));
        }
        let config = Self::read_toml(&path)?;
        Ok((Some(config), Some(path)))
    }

    fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write project config atomically into `dir/tessera.toml`.
    pub fn write_project(dir: &Path, config: &ProjectConfig) -> Result<PathBuf, ConfigError> {
        let path = dir.join(PROJECT_CONFIG_FILE);
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    fn write_config_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Get the base URL.
    ///
    /// Defaults to `http://localhost/`. The value is validated at load time,
    /// so a parse failure here falls back to the default.
    pub fn base_url(&self) -> Url {
        self.project
            .as_ref()
            .and_then(|p| p.base_url.as_deref())
            .and_then(|s| Url::parse(s).ok())
            .unwrap_or_else(default_base_url)
    }

    /// Where the resolution table is read from.
    ///
    /// Defaults to `/importmaps/imports.json` under the base URL.
    pub fn manifest_location(&self) -> Result<DocumentLocation, ConfigError> {
        let source = self.project.as_ref().and_then(|p| p.manifest.as_ref());
        self.document_location(source, DEFAULT_MANIFEST_PATH)
    }

    /// Where the stylesheet list is read from.
    ///
    /// Defaults to `/importmaps/stylesheets.json` under the base URL.
    pub fn stylesheets_location(&self) -> Result<DocumentLocation, ConfigError> {
        let source = self.project.as_ref().and_then(|p| p.stylesheets.as_ref());
        self.document_location(source, DEFAULT_STYLESHEETS_PATH)
    }

    fn document_location(
        &self,
        source: Option<&SourceConfig>,
        default_path: &str,
    ) -> Result<DocumentLocation, ConfigError> {
        if let Some(path) = source.and_then(|s| s.path.as_ref()) {
            return Ok(DocumentLocation::File(path.clone()));
        }

        let raw = source
            .and_then(|s| s.url.as_deref())
            .unwrap_or(default_path);
        let url = self
            .base_url()
            .join(raw)
            .map_err(|e| ConfigError::InvalidValue(format!("invalid url '{}': {}", raw, e)))?;
        Ok(DocumentLocation::Remote(url))
    }

    /// Path of the durable store file.
    ///
    /// Defaults to `~/.tessera/store.json`.
    pub fn store_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = self.global.store.as_ref().and_then(|s| s.path.clone()) {
            return Ok(path);
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".tessera/store.json"))
    }

    /// Route matching options, project over global over defaults.
    pub fn match_options(&self) -> MatchOptions {
        let project = self.project.as_ref().and_then(|p| p.routing.as_ref());
        let global = self.global.routing.as_ref();

        let case_sensitive = project
            .and_then(|r| r.case_sensitive)
            .or_else(|| global.and_then(|r| r.case_sensitive))
            .unwrap_or(false);
        let exact = project
            .and_then(|r| r.exact)
            .or_else(|| global.and_then(|r| r.exact))
            .unwrap_or(false);

        MatchOptions {
            exact,
            case_sensitive,
        }
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded project config file.
    pub fn project_config_loaded_from(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

fn default_base_url() -> Url {
    // Constant input, always parses.
    Url::parse(DEFAULT_BASE_URL).unwrap_or_else(|_| unreachable!("default base url is valid"))
}
