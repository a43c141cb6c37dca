//! DuckDB dialect statements for virtual schema changes.
//!
//! DuckDB refuses to `ALTER` a table that has indexes depending on it, so
//! every alteration lifts the entity's unique indexes first and rebuilds the
//! ones the new snapshot declares afterwards. Unique constraints are always
//! expressed as `uq_<table>_<column>` indexes for the same reason.

use crate::error::{DbError, DbResult};
use crate::value::{selected_as_text, Row};
use serde_json::Value;
use tern_core::{EntityState, FieldName, FieldState, FieldType};

const BACKEND: &str = "duckdb";

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn column_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Integer => "INTEGER",
        FieldType::BigInteger => "BIGINT",
        FieldType::Float => "DOUBLE",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Text => "VARCHAR",
        FieldType::Timestamp => "TIMESTAMP",
        FieldType::Uuid => "UUID",
    }
}

/// Render a JSON value as a SQL literal of the given column type.
pub fn sql_literal(value: &Value, field_type: FieldType) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if selected_as_text(field_type) => {
            format!("CAST({} AS {})", quote_literal(s), column_type(field_type))
        }
        Value::String(s) => quote_literal(s),
        other => quote_literal(&other.to_string()),
    }
}

pub fn unique_index_name(table: &str, column: &str) -> String {
    format!("uq_{table}_{column}")
}

fn column_def(field: &FieldState) -> String {
    let mut def = format!(
        "{} {}",
        quote_ident(&field.name),
        column_type(field.field_type)
    );
    if field.primary_key {
        def.push_str(" PRIMARY KEY");
    } else if !field.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &field.default {
        def.push_str(" DEFAULT ");
        def.push_str(&sql_literal(default, field.field_type));
    }
    def
}

fn create_indexes(entity: &EntityState) -> Vec<String> {
    entity
        .unique_fields()
        .map(|f| {
            format!(
                "CREATE UNIQUE INDEX {} ON {} ({})",
                quote_ident(&unique_index_name(&entity.table, &f.name)),
                quote_ident(&entity.table),
                quote_ident(&f.name)
            )
        })
        .collect()
}

fn drop_indexes(entity: &EntityState) -> Vec<String> {
    entity
        .unique_fields()
        .map(|f| {
            format!(
                "DROP INDEX IF EXISTS {}",
                quote_ident(&unique_index_name(&entity.table, &f.name))
            )
        })
        .collect()
}

/// Wrap `alters` between dropping `before`'s indexes and creating `after`'s.
fn lifted(before: &EntityState, after: &EntityState, alters: Vec<String>) -> Vec<String> {
    let mut statements = drop_indexes(before);
    statements.extend(alters);
    statements.extend(create_indexes(after));
    statements
}

fn alter_table(table: &str) -> String {
    format!("ALTER TABLE {}", quote_ident(table))
}

pub fn create_entity(entity: &EntityState) -> Vec<String> {
    let columns: Vec<String> = entity
        .ordered_fields()
        .into_iter()
        .map(column_def)
        .collect();
    let mut statements = vec![format!(
        "CREATE TABLE {} ({})",
        quote_ident(&entity.table),
        columns.join(", ")
    )];
    statements.extend(create_indexes(entity));
    statements
}

pub fn delete_entity(entity: &EntityState) -> Vec<String> {
    let mut statements = drop_indexes(entity);
    statements.push(format!("DROP TABLE {}", quote_ident(&entity.table)));
    statements
}

pub fn rename_entity(before: &EntityState, after: &EntityState) -> Vec<String> {
    if before.table == after.table {
        return Vec::new();
    }
    lifted(
        before,
        after,
        vec![format!(
            "{} RENAME TO {}",
            alter_table(&before.table),
            quote_ident(&after.table)
        )],
    )
}

pub fn add_field(
    before: &EntityState,
    after: &EntityState,
    field: &FieldState,
) -> DbResult<Vec<String>> {
    if field.primary_key {
        return Err(not_supported("adding a primary key column"));
    }
    let table = alter_table(&after.table);
    let mut add = format!(
        "{table} ADD COLUMN {} {}",
        quote_ident(&field.name),
        column_type(field.field_type)
    );
    if let Some(default) = &field.default {
        add.push_str(" DEFAULT ");
        add.push_str(&sql_literal(default, field.field_type));
    }
    let mut alters = vec![add];
    // ADD COLUMN cannot carry constraints in DuckDB
    if !field.nullable {
        alters.push(format!(
            "{table} ALTER COLUMN {} SET NOT NULL",
            quote_ident(&field.name)
        ));
    }
    Ok(lifted(before, after, alters))
}

pub fn remove_field(before: &EntityState, after: &EntityState, field: &FieldName) -> Vec<String> {
    lifted(
        before,
        after,
        vec![format!(
            "{} DROP COLUMN {}",
            alter_table(&before.table),
            quote_ident(field)
        )],
    )
}

pub fn alter_field(
    before: &EntityState,
    after: &EntityState,
    old: &FieldState,
    new: &FieldState,
) -> DbResult<Vec<String>> {
    if old.primary_key != new.primary_key {
        return Err(not_supported("changing a primary key"));
    }
    let table = alter_table(&after.table);
    let column = quote_ident(&new.name);
    let mut alters = Vec::new();

    if old.field_type != new.field_type {
        alters.push(format!(
            "{table} ALTER COLUMN {column} SET DATA TYPE {}",
            column_type(new.field_type)
        ));
    }
    if old.default != new.default {
        alters.push(match &new.default {
            Some(default) => format!(
                "{table} ALTER COLUMN {column} SET DEFAULT {}",
                sql_literal(default, new.field_type)
            ),
            None => format!("{table} ALTER COLUMN {column} DROP DEFAULT"),
        });
    }
    if old.nullable != new.nullable && !new.primary_key {
        let action = if new.nullable {
            "DROP NOT NULL"
        } else {
            "SET NOT NULL"
        };
        alters.push(format!("{table} ALTER COLUMN {column} {action}"));
    }

    if alters.is_empty() && old.needs_unique_index() == new.needs_unique_index() {
        return Ok(Vec::new());
    }
    Ok(lifted(before, after, alters))
}

pub fn rename_field(
    before: &EntityState,
    after: &EntityState,
    old: &FieldName,
    new: &FieldName,
) -> Vec<String> {
    lifted(
        before,
        after,
        vec![format!(
            "{} RENAME COLUMN {} TO {}",
            alter_table(&before.table),
            quote_ident(old),
            quote_ident(new)
        )],
    )
}

/// Column list for reading rows of `entity`.
pub fn select_list(entity: &EntityState) -> String {
    entity
        .ordered_fields()
        .iter()
        .map(|f| {
            let column = quote_ident(&f.name);
            if selected_as_text(f.field_type) {
                format!("CAST({column} AS VARCHAR) AS {column}")
            } else {
                column
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `WHERE` clause matching every column of `filter`, or an empty string.
pub fn where_clause(entity: &EntityState, filter: &Row) -> String {
    if filter.is_empty() {
        return String::new();
    }
    let conditions: Vec<String> = filter
        .iter()
        .map(|(column, value)| {
            let ident = quote_ident(column);
            if value.is_null() {
                format!("{ident} IS NULL")
            } else {
                format!("{ident} = {}", literal_for(entity, column, value))
            }
        })
        .collect();
    format!(" WHERE {}", conditions.join(" AND "))
}

/// `SET` assignments for an update.
pub fn set_clause(entity: &EntityState, changes: &Row) -> String {
    changes
        .iter()
        .map(|(column, value)| {
            format!(
                "{} = {}",
                quote_ident(column),
                literal_for(entity, column, value)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn insert(entity: &EntityState, row: &Row) -> String {
    if row.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&entity.table));
    }
    let columns: Vec<String> = row.keys().map(|c| quote_ident(c)).collect();
    let values: Vec<String> = row
        .iter()
        .map(|(column, value)| literal_for(entity, column, value))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(&entity.table),
        columns.join(", "),
        values.join(", ")
    )
}

fn literal_for(entity: &EntityState, column: &str, value: &Value) -> String {
    let field_type = entity
        .field(column)
        .map_or(FieldType::Text, |f| f.field_type);
    sql_literal(value, field_type)
}

fn not_supported(feature: &str) -> DbError {
    DbError::NotSupported {
        backend: BACKEND.to_string(),
        feature: feature.to_string(),
    }
}

#[cfg(test)]
#[path = "ddl_test.rs"]
mod tests;
