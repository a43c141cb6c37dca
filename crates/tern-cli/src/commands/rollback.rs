//! Rollback command implementation

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, RollbackArgs};
use crate::commands::common::{cancel_on_ctrl_c, load_project, parse_target, print_report};

/// Execute the rollback command
pub async fn execute(args: &RollbackArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let alias = project.alias(args.database.as_deref())?;
    let target = parse_target(&args.target)?;

    let report = project
        .engine
        .unapply(&alias, &target, &cancel_on_ctrl_c())
        .await
        .with_context(|| format!("Failed to roll back database '{alias}' to {target}"))?;
    print_report(&report);
    Ok(())
}
