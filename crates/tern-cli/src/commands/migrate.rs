//! Migrate command implementation

use anyhow::{bail, Context, Result};

use crate::cli::{GlobalArgs, MigrateArgs};
use crate::commands::common::{cancel_on_ctrl_c, load_project, parse_target, print_report};

/// Execute the migrate command
pub async fn execute(args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let target = parse_target(&args.target)?;
    let cancel = cancel_on_ctrl_c();

    if !args.all {
        let alias = project.alias(args.database.as_deref())?;
        let report = project
            .engine
            .apply(&alias, &target, &cancel)
            .await
            .with_context(|| format!("Failed to migrate database '{alias}'"))?;
        print_report(&report);
        return Ok(());
    }

    let mut failed = Vec::new();
    for (alias, result) in project.engine.apply_all(&target, &cancel).await {
        match result {
            Ok(report) => print_report(&report),
            Err(e) => {
                eprintln!("Database '{}' failed: {}", alias, e);
                failed.push(alias);
            }
        }
    }
    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|a| a.as_str()).collect();
        bail!("Migration failed on: {}", names.join(", "));
    }
    Ok(())
}
