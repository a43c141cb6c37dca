//! Schema changes and their pure state transforms.
//!
//! A [`SchemaChange`] describes one structural edit to the virtual schema.
//! [`state_forward`](SchemaChange::state_forward) folds it into a
//! [`ProjectState`]; [`reverse`](SchemaChange::reverse) derives the inverse
//! change from the state that existed before it ran. The backward state
//! transform is the inverse's forward transform, which is what makes a
//! forward fold followed by a reverse fold land on the original snapshot.

use crate::error::{CoreError, CoreResult};
use crate::names::{EntityName, FieldName, Namespace};
use crate::state::{EntityState, FieldState, ProjectState};
use serde::Serialize;
use std::fmt;

/// One structural edit to the virtual schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaChange {
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
    /// Replace the definition of an existing field (matched by name).
    AlterField {
        entity: EntityName,
        field: FieldState,
    },
    RenameField {
        entity: EntityName,
        old_name: FieldName,
        new_name: FieldName,
    },
}

impl SchemaChange {
    /// The entity this change targets (the old name for renames).
    pub fn entity(&self) -> &EntityName {
        match self {
            SchemaChange::CreateEntity { name, .. } | SchemaChange::DeleteEntity { name } => name,
            SchemaChange::RenameEntity { old_name, .. } => old_name,
            SchemaChange::AddField { entity, .. }
            | SchemaChange::RemoveField { entity, .. }
            | SchemaChange::AlterField { entity, .. }
            | SchemaChange::RenameField { entity, .. } => entity,
        }
    }

    /// Apply this change to `state`.
    ///
    /// On error `state` is left unchanged.
    pub fn state_forward(&self, namespace: &Namespace, state: &mut ProjectState) -> CoreResult<()> {
        match self {
            SchemaChange::CreateEntity {
                name,
                table,
                fields,
            } => {
                let entity = EntityState::new(namespace, name, table.clone(), fields)?;
                state.insert_entity(entity)
            }
            SchemaChange::DeleteEntity { name } => {
                state.remove_entity(namespace, name)?;
                Ok(())
            }
            SchemaChange::RenameEntity { old_name, new_name } => {
                if state.entity(namespace, new_name).is_some() {
                    return Err(CoreError::EntityExists {
                        namespace: namespace.to_string(),
                        entity: new_name.to_string(),
                    });
                }
                let mut entity = state.remove_entity(namespace, old_name)?;
                if entity.table == EntityState::default_table(namespace, old_name) {
                    entity.table = EntityState::default_table(namespace, new_name);
                }
                entity.name = new_name.clone();
                state.insert_entity(entity)
            }
            SchemaChange::AddField { entity, field } => {
                let target = state.require_entity_mut(namespace, entity)?;
                if target.fields.contains_key(&field.name) {
                    return Err(CoreError::FieldExists {
                        entity: target.key().to_string(),
                        field: field.name.to_string(),
                    });
                }
                target.fields.insert(field.name.clone(), field.clone());
                Ok(())
            }
            SchemaChange::RemoveField { entity, name } => {
                let target = state.require_entity_mut(namespace, entity)?;
                target.require_field(name)?;
                target.fields.remove(name);
                Ok(())
            }
            SchemaChange::AlterField { entity, field } => {
                let target = state.require_entity_mut(namespace, entity)?;
                target.require_field(&field.name)?;
                target.fields.insert(field.name.clone(), field.clone());
                Ok(())
            }
            SchemaChange::RenameField {
                entity,
                old_name,
                new_name,
            } => {
                let target = state.require_entity_mut(namespace, entity)?;
                if target.fields.contains_key(new_name) {
                    return Err(CoreError::FieldExists {
                        entity: target.key().to_string(),
                        field: new_name.to_string(),
                    });
                }
                let mut field = target.require_field(old_name)?.clone();
                target.fields.remove(old_name);
                field.name = new_name.clone();
                target.fields.insert(new_name.clone(), field);
                Ok(())
            }
        }
    }

    /// Derive the change that undoes `self`, given the state before `self` ran.
    pub fn reverse(&self, namespace: &Namespace, before: &ProjectState) -> CoreResult<SchemaChange> {
        let reversed = match self {
            SchemaChange::CreateEntity { name, .. } => {
                SchemaChange::DeleteEntity { name: name.clone() }
            }
            SchemaChange::DeleteEntity { name } => {
                let entity = before.require_entity(namespace, name)?;
                SchemaChange::CreateEntity {
                    name: name.clone(),
                    table: Some(entity.table.clone()),
                    fields: entity.fields.values().cloned().collect(),
                }
            }
            SchemaChange::RenameEntity { old_name, new_name } => SchemaChange::RenameEntity {
                old_name: new_name.clone(),
                new_name: old_name.clone(),
            },
            SchemaChange::AddField { entity, field } => SchemaChange::RemoveField {
                entity: entity.clone(),
                name: field.name.clone(),
            },
            SchemaChange::RemoveField { entity, name } => {
                let field = before.require_entity(namespace, entity)?.require_field(name)?;
                SchemaChange::AddField {
                    entity: entity.clone(),
                    field: field.clone(),
                }
            }
            SchemaChange::AlterField { entity, field } => {
                let previous = before
                    .require_entity(namespace, entity)?
                    .require_field(&field.name)?;
                SchemaChange::AlterField {
                    entity: entity.clone(),
                    field: previous.clone(),
                }
            }
            SchemaChange::RenameField {
                entity,
                old_name,
                new_name,
            } => SchemaChange::RenameField {
                // after the rename the entity is still addressed by its own name
                entity: entity.clone(),
                old_name: new_name.clone(),
                new_name: old_name.clone(),
            },
        };
        Ok(reversed)
    }

    /// Undo `self` on `state`, where `before` is the snapshot `self` was applied to.
    pub fn state_backward(
        &self,
        namespace: &Namespace,
        state: &mut ProjectState,
        before: &ProjectState,
    ) -> CoreResult<()> {
        self.reverse(namespace, before)?
            .state_forward(namespace, state)
    }
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaChange::CreateEntity { name, .. } => write!(f, "Create entity {name}"),
            SchemaChange::DeleteEntity { name } => write!(f, "Delete entity {name}"),
            SchemaChange::RenameEntity { old_name, new_name } => {
                write!(f, "Rename entity {old_name} to {new_name}")
            }
            SchemaChange::AddField { entity, field } => {
                write!(f, "Add field {} to {entity}", field.name)
            }
            SchemaChange::RemoveField { entity, name } => {
                write!(f, "Remove field {name} from {entity}")
            }
            SchemaChange::AlterField { entity, field } => {
                write!(f, "Alter field {} on {entity}", field.name)
            }
            SchemaChange::RenameField {
                entity,
                old_name,
                new_name,
            } => write!(f, "Rename field {old_name} on {entity} to {new_name}"),
        }
    }
}

#[cfg(test)]
#[path = "schema_change_test.rs"]
mod tests;
