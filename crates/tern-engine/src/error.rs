//! Error types for tern-engine

use tern_core::{CoreError, DatabaseAlias, MigrationKey};
use tern_db::DbError;
use thiserror::Error;

/// Migration engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Graph, state or configuration error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database collaborator error
    #[error(transparent)]
    Db(#[from] DbError),

    /// A01: Reversal requested through an operation with no backward behavior
    #[error("[A01] Migration '{migration}' cannot be reversed: operation {operation} ({description}) is irreversible")]
    Irreversible {
        migration: MigrationKey,
        operation: usize,
        description: String,
    },

    /// A02: An operation failed and nothing of its migration was kept
    #[error("[A02] Migration '{migration}' failed on '{alias}' at operation {operation} ({description}): {reason}; {}", failure_state(.rolled_back))]
    OperationFailed {
        alias: DatabaseAlias,
        migration: MigrationKey,
        operation: usize,
        description: String,
        reason: String,
        rolled_back: bool,
    },

    /// A03: A non-transactional migration failed after some operations took effect
    #[error("[A03] Migration '{migration}' is partially applied on '{alias}': operation {operation} ({description}) failed: {reason}. Fix the database by hand, then run `tern resolve`")]
    PartiallyApplied {
        alias: DatabaseAlias,
        migration: MigrationKey,
        operation: usize,
        description: String,
        reason: String,
    },

    /// A04: The ledger holds a partial entry from an earlier run
    #[error("[A04] Migration '{migration}' was left partially applied on '{alias}' (failed at operation {operation}); resolve it before migrating")]
    UnresolvedPartial {
        alias: DatabaseAlias,
        migration: MigrationKey,
        operation: usize,
    },

    /// A05: The run was cancelled between migrations
    #[error("[A05] Run on '{alias}' cancelled after {completed} migration(s)")]
    Cancelled {
        alias: DatabaseAlias,
        completed: usize,
    },

    /// A06: The ledger records a migration whose dependency is applied nowhere
    #[error("[A06] Migration '{migration}' is applied on '{alias}' but its dependency '{dependency}' is not applied on any database")]
    InconsistentHistory {
        alias: DatabaseAlias,
        migration: MigrationKey,
        dependency: MigrationKey,
    },

    /// A07: No backend registered for an alias
    #[error("[A07] Unknown database '{alias}'")]
    UnknownDatabase { alias: String },

    /// A08: A data operation used a field or value its virtual entity does not allow
    #[error("[A08] Entity '{entity}': {message}")]
    VirtualShape { entity: String, message: String },

    /// A09: A data callback reported an error
    #[error("[A09] Data callback failed: {0}")]
    Callback(String),

    /// A10: A migration file could not be loaded
    #[error("[A10] Failed to load migration '{path}': {message}")]
    MigrationLoad { path: String, message: String },

    /// A11: Operation needs a primary key the entity does not declare
    #[error("[A11] Entity '{entity}' has no primary key")]
    NoPrimaryKey { entity: String },
}

/// Result type alias for EngineError
pub type EngineResult<T> = Result<T, EngineError>;

fn failure_state(rolled_back: &bool) -> &'static str {
    if *rolled_back {
        "the migration was rolled back"
    } else {
        "no operation of the migration took effect"
    }
}
