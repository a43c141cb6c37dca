//! Strongly-typed identifiers.

use crate::newtype_string::define_newtype_string;

define_newtype_string! {
    /// Namespace (application label) that owns a set of migrations and entities.
    pub struct Namespace;
}

define_newtype_string! {
    /// Name of a migration, unique within its namespace.
    pub struct MigrationName;
}

define_newtype_string! {
    /// Name of an entity (a table in the virtual schema).
    pub struct EntityName;
}

define_newtype_string! {
    /// Name of a field on an entity.
    pub struct FieldName;
}

define_newtype_string! {
    /// Alias of a physical database connection.
    pub struct DatabaseAlias;
}
