//! Model accessor handed to data callbacks.
//!
//! Handles are shaped by the virtual entity in the projected state at the
//! point the callback runs, not by the live table. A field added later in the
//! same run is unknown here, and a field made unique later is still a plain
//! field.

use crate::error::{EngineError, EngineResult};
use serde_json::Value;
use tern_core::{EntityState, FieldType, Namespace, ProjectState};
use tern_db::{Backend, RecordStore, Row};

/// Resolves entity names to queryable handles.
#[derive(Clone, Copy)]
pub struct ModelAccessor<'a> {
    state: &'a ProjectState,
    namespace: &'a Namespace,
    store: &'a dyn Backend,
}

impl<'a> ModelAccessor<'a> {
    pub fn new(state: &'a ProjectState, namespace: &'a Namespace, store: &'a dyn Backend) -> Self {
        Self {
            state,
            namespace,
            store,
        }
    }

    /// The projected state this accessor reads from.
    pub fn state(&self) -> &'a ProjectState {
        self.state
    }

    /// Entity of the running migration's namespace.
    pub fn entity(&self, name: &str) -> EngineResult<EntityHandle<'a>> {
        self.entity_in(self.namespace, name)
    }

    pub fn entity_in(&self, namespace: &str, name: &str) -> EngineResult<EntityHandle<'a>> {
        let entity = self.state.require_entity(namespace, name)?;
        Ok(EntityHandle {
            entity,
            store: self.store,
        })
    }
}

/// CRUD against one entity, validated against its virtual shape.
#[derive(Clone, Copy)]
pub struct EntityHandle<'a> {
    entity: &'a EntityState,
    store: &'a dyn Backend,
}

impl<'a> EntityHandle<'a> {
    /// Virtual description of the entity
    pub fn state(&self) -> &'a EntityState {
        self.entity
    }

    pub fn table(&self) -> &'a str {
        &self.entity.table
    }

    pub async fn all(&self) -> EngineResult<Vec<Row>> {
        Ok(self.store.select_rows(self.entity, &Row::new()).await?)
    }

    pub async fn filter(&self, filter: &Row) -> EngineResult<Vec<Row>> {
        self.check(filter, Usage::Filter)?;
        Ok(self.store.select_rows(self.entity, filter).await?)
    }

    /// Exactly one matching row.
    pub async fn get(&self, filter: &Row) -> EngineResult<Row> {
        let mut rows = self.filter(filter).await?;
        if rows.len() != 1 {
            return Err(self.shape_error(format!(
                "expected exactly one matching row, found {}",
                rows.len()
            )));
        }
        Ok(rows.remove(0))
    }

    pub async fn count(&self) -> EngineResult<usize> {
        Ok(self.store.count_rows(self.entity, &Row::new()).await?)
    }

    pub async fn insert(&self, row: &Row) -> EngineResult<()> {
        self.check(row, Usage::Write)?;
        Ok(self.store.insert_row(self.entity, row).await?)
    }

    /// Update the row whose primary key equals `pk`.
    pub async fn update(&self, pk: &Value, changes: &Row) -> EngineResult<usize> {
        let field = self
            .entity
            .primary_key()
            .ok_or_else(|| EngineError::NoPrimaryKey {
                entity: self.entity.key().to_string(),
            })?;
        let mut filter = Row::new();
        filter.insert(field.name.to_string(), pk.clone());
        self.update_where(&filter, changes).await
    }

    pub async fn update_where(&self, filter: &Row, changes: &Row) -> EngineResult<usize> {
        self.check(filter, Usage::Filter)?;
        self.check(changes, Usage::Write)?;
        Ok(self.store.update_rows(self.entity, changes, filter).await?)
    }

    pub async fn delete(&self, filter: &Row) -> EngineResult<usize> {
        self.check(filter, Usage::Filter)?;
        Ok(self.store.delete_rows(self.entity, filter).await?)
    }

    fn check(&self, row: &Row, usage: Usage) -> EngineResult<()> {
        for (column, value) in row {
            let Some(field) = self.entity.field(column) else {
                return Err(self.shape_error(format!("unknown field '{column}'")));
            };
            if value.is_null() {
                if usage == Usage::Write && !field.nullable {
                    return Err(self.shape_error(format!("field '{column}' is not nullable")));
                }
                continue;
            }
            if !value_matches(value, field.field_type) {
                return Err(self.shape_error(format!(
                    "value {value} does not fit field '{column}' of type {}",
                    field.field_type
                )));
            }
        }
        Ok(())
    }

    fn shape_error(&self, message: String) -> EngineError {
        EngineError::VirtualShape {
            entity: self.entity.key().to_string(),
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Usage {
    Filter,
    Write,
}

fn value_matches(value: &Value, field_type: FieldType) -> bool {
    match field_type {
        FieldType::Integer | FieldType::BigInteger => value.is_i64() || value.is_u64(),
        FieldType::Float => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Text | FieldType::Timestamp => value.is_string(),
        FieldType::Uuid => value
            .as_str()
            .is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
    }
}

#[cfg(test)]
#[path = "accessor_test.rs"]
mod tests;
