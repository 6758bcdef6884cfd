//! cli
//!
//! Command-line interface layer for Tessera.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and open the durable store
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It works on the same store, resolution table and
//! layout planner the runtime uses, so what it prints is what a page would
//! do. `anyhow` is used here and nowhere below.

pub mod args;
pub mod commands;

pub use args::Cli;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::core::config::Config;
use crate::store::{FileStore, KvStore};
use crate::ui::output::{self, Verbosity};

/// Per-invocation context built from global flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Explicit global config file.
    pub config: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }

    /// Directory `tessera.toml` is looked up in.
    pub fn project_dir(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to read current directory"),
        }
    }

    /// Load configuration, honoring `--config` and `--cwd`.
    pub fn load_config(&self) -> Result<Config> {
        let project_dir = self.project_dir()?;
        let loaded = match &self.config {
            Some(path) => Config::load_with_global(path, Some(&project_dir)),
            None => Config::load(Some(&project_dir)),
        }
        .context("Failed to load config")?;

        let config = loaded.config;
        let verbosity = self.verbosity();
        for (label, path) in [
            ("global", config.global_config_loaded_from()),
            ("project", config.project_config_loaded_from()),
        ] {
            match path {
                Some(path) => output::debug(format!("{} config: {}", label, path.display()), verbosity),
                None => output::debug(format!("{} config: defaults", label), verbosity),
            }
        }
        Ok(config)
    }

    /// Open the durable store named by the configuration.
    pub fn open_store(&self, config: &Config) -> Result<Arc<dyn KvStore>> {
        let path = config.store_path().context("Failed to locate store")?;
        tracing::debug!(path = %path.display(), "opening store");
        Ok(Arc::new(FileStore::with_path(path)))
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        cwd: cli.cwd.clone(),
        config: cli.config.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };

    commands::dispatch(cli.command, &ctx)
}
