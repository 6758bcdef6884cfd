//! resolve command - Show where a specifier resolves to

use crate::cli::Context;
use crate::engine::source_from_config;
use crate::resolution::{Origin, ResolutionTable};
use crate::ui::output;
use anyhow::{Context as _, Result};

pub fn resolve(ctx: &Context, specifier: &str) -> Result<()> {
    let config = ctx.load_config()?;
    let store = ctx.open_store(&config)?;
    let source = source_from_config(&config).context("Invalid manifest configuration")?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    let map = rt
        .block_on(source.import_map())
        .context("Failed to read resolution table")?;
    output::debug(
        format!("resolution table has {} entries", map.imports.len()),
        ctx.verbosity(),
    );

    let table = ResolutionTable::new(map, store).context("Failed to read overrides")?;
    let resolution = table.resolve(specifier);
    let origin = match resolution.origin {
        Origin::Override => "override",
        Origin::Base => "base",
        Origin::Passthrough => "unmapped",
    };
    println!("{} ({})", resolution.location, origin);
    Ok(())
}
