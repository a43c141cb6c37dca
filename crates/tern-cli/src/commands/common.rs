//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tern_core::{Config, DatabaseAlias, Target};
use tern_engine::{ApplyReport, CancelToken, Engine, MigrationOutcome};

use crate::cli::GlobalArgs;

/// A loaded project: its configuration and engine.
pub(crate) struct Project {
    pub(crate) config: Config,
    pub(crate) engine: Engine,
}

impl Project {
    /// The alias named on the command line, or the configured default.
    pub(crate) fn alias(&self, database: Option<&str>) -> Result<DatabaseAlias> {
        match database {
            Some(name) => DatabaseAlias::try_new(name).context("Database alias must not be empty"),
            None => Ok(self.config.default_alias()),
        }
    }
}

/// Load `tern.yml` from `--config`, or from the project directory.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<(Config, PathBuf)> {
    let root = PathBuf::from(&global.project_dir);
    let config = match &global.config {
        Some(path) => Config::load(Path::new(path)),
        None => Config::load_from_dir(&root),
    }
    .context("Failed to load configuration")?;
    Ok((config, root))
}

/// Load the configuration and open every configured database.
pub(crate) fn load_project(global: &GlobalArgs) -> Result<Project> {
    let (config, root) = load_config(global)?;
    let engine = Engine::from_config(&config, &root).context("Failed to load migrations")?;
    log::debug!(
        "Loaded {} migration(s) for project '{}'",
        engine.planner().len(),
        config.name
    );
    Ok(Project { config, engine })
}

pub(crate) fn parse_target(value: &str) -> Result<Target> {
    value
        .parse()
        .with_context(|| format!("Invalid target '{value}'"))
}

/// A token that trips on the first Ctrl-C; the run stops after the
/// migration in flight.
pub(crate) fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping after the current migration");
            token.cancel();
        }
    });
    cancel
}

fn outcome_label(outcome: MigrationOutcome) -> &'static str {
    match outcome {
        MigrationOutcome::Applied => "applied",
        MigrationOutcome::Unapplied => "unapplied",
        MigrationOutcome::AlreadyApplied => "already applied",
        MigrationOutcome::NotApplied => "not applied",
        MigrationOutcome::Routed => "routed away",
    }
}

/// Print one line per planned migration and a summary.
pub(crate) fn print_report(report: &ApplyReport) {
    let width = report
        .outcomes
        .iter()
        .map(|r| r.migration.to_string().len())
        .max()
        .unwrap_or(9)
        .max(9);

    println!("Database '{}' ({}):", report.alias, report.direction);
    for r in &report.outcomes {
        println!(
            "  {:<width$}  {:<15}  {}ms",
            r.migration.to_string(),
            outcome_label(r.outcome),
            r.duration.as_millis(),
            width = width
        );
    }
    let executed = report.executed().len();
    if executed == 0 {
        println!("  Nothing to do");
    } else {
        println!("  {} migration(s) {}", executed, verb(report));
    }
}

fn verb(report: &ApplyReport) -> &'static str {
    if report.count(MigrationOutcome::Unapplied) > 0 {
        "unapplied"
    } else {
        "applied"
    }
}
