//! overrides command - List, set, remove or reset import map overrides

use crate::cli::Context;
use crate::resolution::{CallSite, OverrideTable};
use crate::ui::output;
use anyhow::{Context as _, Result};

fn open(ctx: &Context) -> Result<OverrideTable> {
    let config = ctx.load_config()?;
    let store = ctx.open_store(&config)?;
    OverrideTable::load(store).context("Failed to read overrides")
}

/// Print every override as `specifier = url`.
pub fn list(ctx: &Context) -> Result<()> {
    let table = open(ctx)?;
    if table.is_empty() {
        output::print("No overrides.", ctx.verbosity());
        return Ok(());
    }
    for (specifier, url) in table.entries() {
        println!("{} = {}", specifier, url);
    }
    Ok(())
}

pub fn set(ctx: &Context, specifier: &str, url: &str) -> Result<()> {
    let mut table = open(ctx)?;
    table
        .set(&CallSite::OverrideTool, specifier, url)
        .with_context(|| format!("Failed to override {}", specifier))?;
    output::success(format!("{} -> {}", specifier, url), ctx.verbosity());
    Ok(())
}

pub fn remove(ctx: &Context, specifier: &str) -> Result<()> {
    let mut table = open(ctx)?;
    let removed = table
        .remove(&CallSite::OverrideTool, specifier)
        .with_context(|| format!("Failed to remove override for {}", specifier))?;
    if removed {
        output::success(format!("Removed override for {}", specifier), ctx.verbosity());
    } else {
        output::warn(format!("No override for {}", specifier), ctx.verbosity());
    }
    Ok(())
}

pub fn reset(ctx: &Context) -> Result<()> {
    let mut table = open(ctx)?;
    table
        .reset(&CallSite::OverrideTool)
        .context("Failed to reset overrides")?;
    output::success("Overrides cleared.", ctx.verbosity());
    Ok(())
}
