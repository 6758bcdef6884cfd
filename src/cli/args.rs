//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory (where `tessera.toml` is looked up)
//! - `--config <path>`: Use this global config file instead of the default lookup
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tessera - operator tool for a micro-frontend page shell
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if tessera was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Global config file to use
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or edit the import map overrides
    #[command(
        name = "overrides",
        long_about = "Inspect or edit the import map overrides.\n\n\
            Overrides are stored in the durable store and take precedence over the \
            base resolution table. Values must be absolute URLs.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Point a fragment at a local dev server
    tessera overrides set @shop/cart http://localhost:8080/cart.js

    # See what is overridden
    tessera overrides list

    # Go back to the published build
    tessera overrides remove @shop/cart"
    )]
    Overrides {
        #[command(subcommand)]
        action: OverridesAction,
    },

    /// Show where a specifier resolves to
    #[command(
        name = "resolve",
        long_about = "Show where a specifier resolves to.\n\n\
            Reads the resolution table named by the configuration, layers the stored \
            overrides on top and prints the location and which layer supplied it."
    )]
    Resolve {
        /// Module specifier, e.g. @shop/cart
        specifier: String,
    },

    /// Show which fragments a layout mounts for a path
    #[command(
        name = "routes",
        after_help = "\
EXAMPLES:
    tessera routes index.html /dashboard/settings"
    )]
    Routes {
        /// Layout template file
        template: PathBuf,

        /// Navigation path, e.g. /dashboard
        path: String,
    },

    /// Inspect or flip the diagnostics overlay flag
    #[command(name = "devtools")]
    Devtools {
        #[command(subcommand)]
        action: DevtoolsAction,
    },
}

/// Override subcommands.
#[derive(Subcommand, Debug)]
pub enum OverridesAction {
    /// List overrides
    List,

    /// Set an override
    Set {
        /// Module specifier
        specifier: String,

        /// Absolute URL to load it from
        url: String,
    },

    /// Remove one override
    Remove {
        /// Module specifier
        specifier: String,
    },

    /// Remove every override
    Reset,
}

/// Devtools subcommands.
#[derive(Subcommand, Debug)]
pub enum DevtoolsAction {
    /// Print whether the overlay is on
    Status,

    /// Flip the overlay flag
    Toggle,
}
