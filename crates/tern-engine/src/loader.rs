//! Declarative migration files.
//!
//! Layout: `<migration_path>/<namespace>/<name>.yml`. The namespace comes
//! from the directory, the migration name from the file stem.

use crate::error::{EngineError, EngineResult};
use crate::migration::Migration;
use crate::operation::Operation;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tern_core::{
    EntityName, FieldName, FieldState, Hints, MigrationKey, MigrationName, Namespace, SchemaChange,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MigrationFile {
    /// `namespace.name`, or a bare name in the file's own namespace
    #[serde(default)]
    dependencies: Vec<String>,

    #[serde(default)]
    initial: bool,

    #[serde(default = "default_atomic")]
    atomic: bool,

    #[serde(default)]
    hints: Hints,

    #[serde(default)]
    operations: Vec<OperationDef>,
}

fn default_atomic() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct OperationDef {
    #[serde(flatten)]
    change: ChangeDef,

    #[serde(default)]
    hints: Hints,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ChangeDef {
    CreateEntity {
        name: EntityName,
        table: Option<String>,
        fields: Vec<FieldState>,
    },
    DeleteEntity {
        name: EntityName,
    },
    RenameEntity {
        old_name: EntityName,
        new_name: EntityName,
    },
    AddField {
        entity: EntityName,
        field: FieldState,
    },
    RemoveField {
        entity: EntityName,
        name: FieldName,
    },
    AlterField {
        entity: EntityName,
        field: FieldState,
    },
    RenameField {
        entity: EntityName,
        old_name: FieldName,
        new_name: FieldName,
    },
    RunSql {
        sql: Vec<String>,
        reverse_sql: Option<Vec<String>>,
    },
}

impl From<OperationDef> for Operation {
    fn from(def: OperationDef) -> Self {
        let operation = match def.change {
            ChangeDef::CreateEntity {
                name,
                table,
                fields,
            } => Operation::schema(SchemaChange::CreateEntity {
                name,
                table,
                fields,
            }),
            ChangeDef::DeleteEntity { name } => {
                Operation::schema(SchemaChange::DeleteEntity { name })
            }
            ChangeDef::RenameEntity { old_name, new_name } => {
                Operation::schema(SchemaChange::RenameEntity { old_name, new_name })
            }
            ChangeDef::AddField { entity, field } => {
                Operation::schema(SchemaChange::AddField { entity, field })
            }
            ChangeDef::RemoveField { entity, name } => {
                Operation::schema(SchemaChange::RemoveField { entity, name })
            }
            ChangeDef::AlterField { entity, field } => {
                Operation::schema(SchemaChange::AlterField { entity, field })
            }
            ChangeDef::RenameField {
                entity,
                old_name,
                new_name,
            } => Operation::schema(SchemaChange::RenameField {
                entity,
                old_name,
                new_name,
            }),
            ChangeDef::RunSql { sql, reverse_sql } => Operation::sql(sql, reverse_sql),
        };
        operation.with_hints(def.hints)
    }
}

/// Parse one migration from YAML text.
pub fn parse_migration(namespace: &Namespace, name: &str, content: &str) -> EngineResult<Migration> {
    let load_error = |message: String| EngineError::MigrationLoad {
        path: format!("{namespace}.{name}"),
        message,
    };

    let file: MigrationFile =
        serde_yaml::from_str(content).map_err(|e| load_error(e.to_string()))?;
    if namespace.as_str().contains('.') {
        return Err(load_error(format!(
            "namespace '{namespace}' must not contain '.'"
        )));
    }
    let name = MigrationName::try_new(name)
        .ok_or_else(|| load_error("migration name is empty".to_string()))?;
    let key = MigrationKey {
        namespace: namespace.clone(),
        name,
    };

    let mut migration = Migration::with_key(key).atomic(file.atomic);
    migration.initial = file.initial;
    migration.hints = file.hints;
    for dependency in &file.dependencies {
        let dep = MigrationKey::parse_in(dependency, Some(namespace))
            .map_err(|e| load_error(e.to_string()))?;
        migration = migration.depends_on(dep);
    }
    migration
        .operations
        .extend(file.operations.into_iter().map(Operation::from));
    Ok(migration)
}

/// Load one migration file; the parent directory names its namespace.
pub fn load_migration_file(path: &Path) -> EngineResult<Migration> {
    let load_error = |message: String| EngineError::MigrationLoad {
        path: path.display().to_string(),
        message,
    };

    let namespace = path
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .and_then(Namespace::try_new)
        .ok_or_else(|| load_error("cannot derive namespace from directory".to_string()))?;
    let name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .ok_or_else(|| load_error("cannot derive migration name from file name".to_string()))?;

    let content = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
    parse_migration(&namespace, name, &content).map_err(|e| match e {
        EngineError::MigrationLoad { message, .. } => load_error(message),
        other => other,
    })
}

/// Discover and load every migration under `paths`.
///
/// Missing directories are skipped; files that are not YAML are skipped
/// with a warning.
pub fn load_migrations(paths: &[PathBuf]) -> EngineResult<Vec<Migration>> {
    let mut migrations = Vec::new();

    for root in paths {
        if !root.exists() {
            log::debug!("Migration path {} does not exist", root.display());
            continue;
        }

        for namespace_dir in sorted_entries(root)? {
            if !namespace_dir.is_dir() {
                log::warn!(
                    "Ignoring {}: expected a namespace directory",
                    namespace_dir.display()
                );
                continue;
            }

            for path in sorted_entries(&namespace_dir)? {
                if path
                    .extension()
                    .is_some_and(|e| e == "yml" || e == "yaml")
                {
                    migrations.push(load_migration_file(&path)?);
                } else {
                    log::warn!("Ignoring {}: not a migration file", path.display());
                }
            }
        }
    }

    log::debug!("Loaded {} migration(s)", migrations.len());
    Ok(migrations)
}

fn sorted_entries(dir: &Path) -> EngineResult<Vec<PathBuf>> {
    let read_error = |e: std::io::Error| EngineError::MigrationLoad {
        path: dir.display().to_string(),
        message: e.to_string(),
    };
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_error)? {
        entries.push(entry.map_err(read_error)?.path());
    }
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
