//! Resolve command implementation

use anyhow::{Context, Result};
use tern_core::MigrationKey;
use tern_engine::Resolution;

use crate::cli::{GlobalArgs, ResolveArgs};
use crate::commands::common::load_project;

/// Execute the resolve command
pub async fn execute(args: &ResolveArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let alias = project.alias(Some(&args.database))?;
    let key = MigrationKey::parse(&args.migration)
        .with_context(|| format!("Invalid migration '{}'", args.migration))?;
    let resolution = if args.mark_applied {
        Resolution::MarkApplied
    } else {
        Resolution::MarkPending
    };

    project
        .engine
        .resolve(&alias, &key, resolution)
        .await
        .with_context(|| format!("Failed to resolve {key} on '{alias}'"))?;

    match resolution {
        Resolution::MarkApplied => println!("{} marked as applied on '{}'", key, alias),
        Resolution::MarkPending => println!("{} marked as pending on '{}'", key, alias),
    }
    Ok(())
}
