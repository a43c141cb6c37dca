//! Error types for tern-core

use crate::key::MigrationKey;
use thiserror::Error;

/// Core error type for tern
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: The migration graph contains a cycle
    #[error("[E004] Circular dependency detected: {}", format_cycle(.cycle))]
    CircularDependency { cycle: Vec<MigrationKey> },

    /// E005: A migration depends on a migration that is not part of the graph
    #[error("[E005] Migration '{migration}' depends on unknown migration '{dependency}'")]
    UnknownDependency {
        migration: MigrationKey,
        dependency: MigrationKey,
    },

    /// E006: A requested migration is not part of the graph
    #[error("[E006] Migration not found: {key}")]
    MigrationNotFound { key: String },

    /// E007: Two migrations share the same key
    #[error("[E007] Duplicate migration: {key}")]
    DuplicateMigration { key: MigrationKey },

    /// E008: A migration key or target could not be parsed
    #[error("[E008] Invalid migration reference '{value}': {reason}")]
    InvalidMigrationKey { value: String, reason: String },

    /// E009: Entity missing from the virtual schema
    #[error("[E009] Entity '{namespace}.{entity}' does not exist in the project state")]
    EntityNotFound { namespace: String, entity: String },

    /// E010: Entity already present in the virtual schema
    #[error("[E010] Entity '{namespace}.{entity}' already exists in the project state")]
    EntityExists { namespace: String, entity: String },

    /// E011: Field missing from an entity
    #[error("[E011] Field '{field}' does not exist on entity '{entity}'")]
    FieldNotFound { entity: String, field: String },

    /// E012: Field already present on an entity
    #[error("[E012] Field '{field}' already exists on entity '{entity}'")]
    FieldExists { entity: String, field: String },

    /// E013: Two routers share a priority, so their order is ambiguous
    #[error("[E013] Routers '{first}' and '{second}' share priority {priority}; give them distinct priorities")]
    RouterConflict {
        first: String,
        second: String,
        priority: i32,
    },

    /// E014: IO error
    #[error("[E014] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E015: IO error with file path context
    #[error("[E015] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E016: YAML parse error
    #[error("[E016] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

fn format_cycle(cycle: &[MigrationKey]) -> String {
    let mut parts: Vec<String> = cycle.iter().map(ToString::to_string).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.to_string());
    }
    parts.join(" -> ")
}
