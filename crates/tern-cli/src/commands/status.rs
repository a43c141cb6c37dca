//! Status command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tern_core::{DatabaseAlias, LedgerEntry, MigrationKey};

use crate::cli::{GlobalArgs, StatusArgs};
use crate::commands::common::{load_project, Project};

#[derive(Serialize)]
struct StatusOutput {
    ledger: Vec<LedgerEntry>,
    pending: Vec<MigrationKey>,
}

/// Execute the status command
pub async fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let project = load_project(global)?;
    let aliases = match args.database.as_deref() {
        Some(name) => vec![project.alias(Some(name))?],
        None => project.config.aliases(),
    };

    let mut outputs = BTreeMap::new();
    for alias in aliases {
        let output = collect(&project, &alias).await?;
        outputs.insert(alias, output);
    }

    if args.json {
        let json =
            serde_json::to_string_pretty(&outputs).context("Failed to serialize to JSON")?;
        println!("{}", json);
        return Ok(());
    }

    for (alias, output) in &outputs {
        print_status(alias, output);
    }
    Ok(())
}

async fn collect(project: &Project, alias: &DatabaseAlias) -> Result<StatusOutput> {
    let ledger = project
        .engine
        .ledger(alias)
        .await
        .with_context(|| format!("Failed to read the ledger of '{alias}'"))?;
    let known: Vec<&MigrationKey> = ledger.iter().map(|e| &e.migration).collect();
    let pending = project
        .engine
        .planner()
        .graph()
        .forward_order()
        .into_iter()
        .filter(|k| !known.contains(&k))
        .collect();
    Ok(StatusOutput { ledger, pending })
}

fn print_status(alias: &DatabaseAlias, output: &StatusOutput) {
    let width = output
        .ledger
        .iter()
        .map(|e| &e.migration)
        .chain(&output.pending)
        .map(|k| k.to_string().len())
        .max()
        .unwrap_or(9)
        .max(9);

    println!("Database '{}':", alias);
    println!("  {:<width$}  {:<10}  APPLIED_AT", "MIGRATION", "STATUS", width = width);
    println!("  {:-<width$}  {:-<10}  {}", "", "", "-".repeat(25), width = width);
    for entry in &output.ledger {
        println!(
            "  {:<width$}  {:<10}  {}",
            entry.migration.to_string(),
            entry.status.as_str(),
            entry.applied_at.format("%Y-%m-%d %H:%M:%S"),
            width = width
        );
        if let Some(operation) = entry.status.failed_operation() {
            println!("    failed at operation {}; run `tern resolve` before migrating", operation);
        }
    }
    for key in &output.pending {
        println!("  {:<width$}  {:<10}  -", key.to_string(), "pending", width = width);
    }
    println!();
}
