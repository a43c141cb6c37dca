//! Virtual schema model: the Project State.
//!
//! A [`ProjectState`] is a point-in-time description of every entity the
//! migrations have declared so far. It is produced by folding schema changes
//! and never consults a live database, so data callbacks see the shape the
//! migration author built at that point of the migration, not the latest one.

use crate::error::{CoreError, CoreResult};
use crate::names::{EntityName, FieldName, Namespace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Column type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Integer,
    BigInteger,
    Float,
    Boolean,
    Text,
    Timestamp,
    Uuid,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Integer => "integer",
            FieldType::BigInteger => "big_integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Text => "text",
            FieldType::Timestamp => "timestamp",
            FieldType::Uuid => "uuid",
        };
        f.write_str(s)
    }
}

/// Description of one field of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldState {
    pub name: FieldName,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Whether NULL is allowed
    #[serde(default)]
    pub nullable: bool,

    /// Whether values must be distinct
    #[serde(default)]
    pub unique: bool,

    #[serde(default)]
    pub primary_key: bool,

    /// Column default used by the database for rows that omit the field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldState {
    /// A non-nullable, non-unique field with no default.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: FieldName::new(name),
            field_type,
            nullable: false,
            unique: false,
            primary_key: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// True when the database needs a separate unique index for this field.
    ///
    /// Primary keys carry their own uniqueness.
    pub fn needs_unique_index(&self) -> bool {
        self.unique && !self.primary_key
    }
}

/// Address of an entity inside a [`ProjectState`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub namespace: Namespace,
    pub name: EntityName,
}

impl EntityKey {
    pub fn new(namespace: &Namespace, name: &EntityName) -> Self {
        Self {
            namespace: namespace.clone(),
            name: name.clone(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Virtual description of one entity (table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    pub namespace: Namespace,
    pub name: EntityName,

    /// Physical table name
    pub table: String,

    /// Fields keyed by name; field order carries no meaning
    pub fields: BTreeMap<FieldName, FieldState>,
}

impl EntityState {
    /// Build an entity, rejecting duplicate field names.
    pub fn new(
        namespace: &Namespace,
        name: &EntityName,
        table: Option<String>,
        fields: &[FieldState],
    ) -> CoreResult<Self> {
        let mut map = BTreeMap::new();
        for field in fields {
            if map.insert(field.name.clone(), field.clone()).is_some() {
                return Err(CoreError::FieldExists {
                    entity: format!("{namespace}.{name}"),
                    field: field.name.to_string(),
                });
            }
        }
        Ok(Self {
            namespace: namespace.clone(),
            name: name.clone(),
            table: table.unwrap_or_else(|| Self::default_table(namespace, name)),
            fields: map,
        })
    }

    /// Default physical table name: `<namespace>_<entity>`, lowercased.
    pub fn default_table(namespace: &Namespace, name: &EntityName) -> String {
        format!("{}_{}", namespace, name).to_lowercase()
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(&self.namespace, &self.name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldState> {
        self.fields.get(name)
    }

    /// Look up a field, failing with [`CoreError::FieldNotFound`].
    pub fn require_field(&self, name: &str) -> CoreResult<&FieldState> {
        self.fields.get(name).ok_or_else(|| CoreError::FieldNotFound {
            entity: self.key().to_string(),
            field: name.to_string(),
        })
    }

    /// The primary key field, if one is declared.
    pub fn primary_key(&self) -> Option<&FieldState> {
        self.fields.values().find(|f| f.primary_key)
    }

    /// Fields backed by a unique index.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldState> {
        self.fields.values().filter(|f| f.needs_unique_index())
    }

    /// Fields in column order: primary key first, then by name.
    pub fn ordered_fields(&self) -> Vec<&FieldState> {
        let mut fields: Vec<&FieldState> = self.fields.values().collect();
        fields.sort_by_key(|f| !f.primary_key);
        fields
    }
}

/// Snapshot of every entity known at one point of a migration run.
///
/// Cloning is the supported way to keep a snapshot: later changes to a clone
/// never alter snapshots already handed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectState {
    entities: BTreeMap<EntityKey, EntityState>,
}

impl ProjectState {
    /// The empty state: "before any migration".
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn entity(&self, namespace: &str, name: &str) -> Option<&EntityState> {
        self.entities.get(&lookup_key(namespace, name)?)
    }

    /// Look up an entity, failing with [`CoreError::EntityNotFound`].
    pub fn require_entity(&self, namespace: &str, name: &str) -> CoreResult<&EntityState> {
        self.entity(namespace, name)
            .ok_or_else(|| entity_not_found(namespace, name))
    }

    pub(crate) fn require_entity_mut(
        &mut self,
        namespace: &str,
        name: &str,
    ) -> CoreResult<&mut EntityState> {
        lookup_key(namespace, name)
            .and_then(|key| self.entities.get_mut(&key))
            .ok_or_else(|| entity_not_found(namespace, name))
    }

    /// Add an entity, failing if one with the same key exists.
    pub fn insert_entity(&mut self, entity: EntityState) -> CoreResult<()> {
        let key = entity.key();
        if self.entities.contains_key(&key) {
            return Err(CoreError::EntityExists {
                namespace: key.namespace.to_string(),
                entity: key.name.to_string(),
            });
        }
        self.entities.insert(key, entity);
        Ok(())
    }

    /// Remove and return an entity.
    pub fn remove_entity(&mut self, namespace: &str, name: &str) -> CoreResult<EntityState> {
        lookup_key(namespace, name)
            .and_then(|key| self.entities.remove(&key))
            .ok_or_else(|| entity_not_found(namespace, name))
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    /// Entities declared by one namespace.
    pub fn namespace_entities<'a>(
        &'a self,
        namespace: &'a str,
    ) -> impl Iterator<Item = &'a EntityState> + 'a {
        self.entities
            .values()
            .filter(move |e| e.namespace == namespace)
    }
}

impl Serialize for ProjectState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entities.values())
    }
}

fn lookup_key(namespace: &str, name: &str) -> Option<EntityKey> {
    Some(EntityKey {
        namespace: Namespace::try_new(namespace)?,
        name: EntityName::try_new(name)?,
    })
}

fn entity_not_found(namespace: &str, name: &str) -> CoreError {
    CoreError::EntityNotFound {
        namespace: namespace.to_string(),
        entity: name.to_string(),
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
