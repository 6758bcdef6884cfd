//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads configuration through the [`Context`]
//! 2. Calls into the runtime modules
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! `resolve` may fetch the resolution table over HTTP. Its handler builds a
//! tokio runtime and blocks on the fetch, so dispatch stays synchronous.

mod devtools;
mod overrides;
mod resolve;
mod routes;

pub use devtools::{status as devtools_status, toggle as devtools_toggle};
pub use overrides::{
    list as overrides_list, remove as overrides_remove, reset as overrides_reset,
    set as overrides_set,
};
pub use resolve::resolve;
pub use routes::routes;

use super::args::{Command, DevtoolsAction, OverridesAction};
use super::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Overrides { action } => match action {
            OverridesAction::List => overrides::list(ctx),
            OverridesAction::Set { specifier, url } => overrides::set(ctx, &specifier, &url),
            OverridesAction::Remove { specifier } => overrides::remove(ctx, &specifier),
            OverridesAction::Reset => overrides::reset(ctx),
        },
        Command::Resolve { specifier } => resolve::resolve(ctx, &specifier),
        Command::Routes { template, path } => routes::routes(ctx, &template, &path),
        Command::Devtools { action } => match action {
            DevtoolsAction::Status => devtools::status(ctx),
            DevtoolsAction::Toggle => devtools::toggle(ctx),
        },
    }
}
