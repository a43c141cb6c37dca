//! Plan command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use tern_core::{DatabaseAlias, MigrationKey};
use tern_engine::Direction;

use crate::cli::{GlobalArgs, PlanArgs};
use crate::commands::common::{load_project, parse_target};

#[derive(Serialize)]
struct PlanOutput<'a> {
    database: &'a DatabaseAlias,
    target: String,
    direction: Direction,
    migrations: &'a [MigrationKey],
}

/// Execute the plan command
pub async fn execute(args: &PlanArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let alias = project.alias(args.database.as_deref())?;
    let target = parse_target(&args.target)?;
    let direction = if args.backward {
        Direction::Backward
    } else {
        Direction::Forward
    };

    let migrations = project
        .engine
        .plan(&alias, &target, direction)
        .await
        .with_context(|| format!("Failed to plan database '{alias}'"))?;

    if args.json {
        let output = PlanOutput {
            database: &alias,
            target: target.to_string(),
            direction,
            migrations: &migrations,
        };
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize to JSON")?;
        println!("{}", json);
        return Ok(());
    }

    if migrations.is_empty() {
        println!("Database '{}' is already at {}", alias, target);
        return Ok(());
    }
    println!("Plan for '{}' ({} to {}):", alias, direction, target);
    for (i, key) in migrations.iter().enumerate() {
        println!("  {:>3}. {}", i + 1, key);
    }
    Ok(())
}
