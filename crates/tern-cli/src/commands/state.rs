//! State command implementation

use anyhow::{Context, Result};
use tern_core::EntityState;

use crate::cli::{GlobalArgs, StateArgs};
use crate::commands::common::{load_project, parse_target};

/// Execute the state command
pub async fn execute(args: &StateArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let target = parse_target(&args.target)?;

    let state = project
        .engine
        .project_state(&target)
        .with_context(|| format!("Failed to project state at {target}"))?;
    let entities: Vec<&EntityState> = state.entities().collect();
    let json = serde_json::to_string_pretty(&entities).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}
