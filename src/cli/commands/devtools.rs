//! devtools command - Inspect or flip the diagnostics overlay flag

use crate::cli::Context;
use crate::devtools::DevtoolsFlag;
use crate::events::EventBus;
use anyhow::{Context as _, Result};

fn flag(ctx: &Context) -> Result<DevtoolsFlag> {
    let config = ctx.load_config()?;
    let store = ctx.open_store(&config)?;
    Ok(DevtoolsFlag::new(store, EventBus::global()))
}

pub fn status(ctx: &Context) -> Result<()> {
    let active = flag(ctx)?.is_active().context("Failed to read devtools flag")?;
    println!("{}", if active { "on" } else { "off" });
    Ok(())
}

pub fn toggle(ctx: &Context) -> Result<()> {
    let active = flag(ctx)?.toggle().context("Failed to write devtools flag")?;
    println!("{}", if active { "on" } else { "off" });
    Ok(())
}
