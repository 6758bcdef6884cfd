//! routes command - Show which fragments a layout mounts for a path

use std::collections::HashMap;
use std::path::Path;

use crate::cli::Context;
use crate::layout::{plan, DeclaredSlot, LayoutTemplate};
use crate::navigation::NavigationState;
use crate::ui::output;
use anyhow::{Context as _, Result};

pub fn routes(ctx: &Context, template: &Path, path: &str) -> Result<()> {
    let config = ctx.load_config()?;
    let html = std::fs::read_to_string(template)
        .with_context(|| format!("Failed to read {}", template.display()))?;
    let layout = LayoutTemplate::parse(&html)
        .with_context(|| format!("Invalid layout in {}", template.display()))?;
    let state = NavigationState::from_path(path)?;

    let slots = DeclaredSlot::declare_all(layout.slots(), &HashMap::new());
    let mounted = plan(&slots, &state, config.match_options());
    let names: Vec<&str> = slots
        .iter()
        .filter(|s| mounted.contains(&s.id()))
        .map(DeclaredSlot::name)
        .collect();

    if names.is_empty() {
        output::print(format!("Nothing mounts at {}", state.path), ctx.verbosity());
        return Ok(());
    }
    println!("{}", output::format_list(&names, ""));
    Ok(())
}
