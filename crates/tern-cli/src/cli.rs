//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand};

/// tern - plan, apply and roll back schema migrations across databases
#[derive(Parser, Debug)]
#[command(name = "tern")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the migrations a run would execute
    Plan(PlanArgs),

    /// Apply migrations forward
    Migrate(MigrateArgs),

    /// Unapply migrations back to a target
    Rollback(RollbackArgs),

    /// Show the ledger of a database
    Status(StatusArgs),

    /// Correct a ledger entry by hand
    Resolve(ResolveArgs),

    /// Print the projected virtual schema
    State(StateArgs),
}

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Database alias (default: the configured default database)
    #[arg(short, long)]
    pub database: Option<String>,

    /// `latest`, `namespace.name` or `namespace.zero`
    #[arg(short, long, default_value = "latest")]
    pub target: String,

    /// Plan a rollback instead of a forward run
    #[arg(long)]
    pub backward: bool,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the migrate command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Database alias (default: the configured default database)
    #[arg(short, long, conflicts_with = "all")]
    pub database: Option<String>,

    /// Migrate every configured database concurrently
    #[arg(long)]
    pub all: bool,

    /// `latest`, `namespace.name` or `namespace.zero`
    #[arg(short, long, default_value = "latest")]
    pub target: String,
}

/// Arguments for the rollback command
#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Database alias (default: the configured default database)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Last migration to keep, `namespace.zero`, or `latest` for everything
    #[arg(short, long)]
    pub target: String,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Database alias (default: every configured database)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Print the ledger as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the resolve command
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Database alias
    #[arg(short, long)]
    pub database: String,

    /// Migration key (`namespace.name`)
    pub migration: String,

    /// Record the migration as applied instead of dropping its entry
    #[arg(long)]
    pub mark_applied: bool,
}

/// Arguments for the state command
#[derive(Args, Debug)]
pub struct StateArgs {
    /// `latest`, `namespace.name` or `namespace.zero`
    #[arg(short, long, default_value = "latest")]
    pub target: String,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
