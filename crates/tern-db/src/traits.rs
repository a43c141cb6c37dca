//! Collaborator traits consumed by the migration engine.
//!
//! The engine never writes dialect SQL for schema changes itself. It hands
//! the virtual entity snapshots to a [`SchemaEditor`], reads and writes rows
//! through a [`RecordStore`] and keeps the applied set in a [`LedgerStore`].
//! [`Backend`] bundles the three for one database alias.

use crate::error::DbResult;
use crate::value::Row;
use async_trait::async_trait;
use tern_core::{DatabaseAlias, EntityState, FieldName, FieldState, LedgerEntry, MigrationKey};

/// Scoped DDL transaction on one database.
///
/// Must be passed back to [`SchemaEditor::commit`] or
/// [`SchemaEditor::rollback`].
#[must_use = "a DDL transaction must be committed or rolled back"]
#[derive(Debug)]
pub struct DdlTransaction {
    alias: DatabaseAlias,
}

impl DdlTransaction {
    pub fn new(alias: DatabaseAlias) -> Self {
        Self { alias }
    }

    /// Database the transaction belongs to
    pub fn alias(&self) -> &DatabaseAlias {
        &self.alias
    }
}

/// Outcome of [`SchemaEditor::begin_ddl_transaction`].
#[derive(Debug)]
pub enum TransactionSupport {
    Begun(DdlTransaction),
    /// DDL on this database autocommits
    NotSupported,
}

/// Issues schema DDL for the virtual schema changes.
///
/// Methods that alter an existing entity receive the entity snapshot before
/// and after the change so the dialect can rebuild dependent objects such as
/// unique indexes.
#[async_trait]
pub trait SchemaEditor: Send + Sync {
    /// Alias of the database this editor writes to
    fn alias(&self) -> &DatabaseAlias;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;

    /// Open a transaction covering DDL, or report that DDL autocommits.
    async fn begin_ddl_transaction(&self) -> DbResult<TransactionSupport>;

    async fn commit(&self, tx: DdlTransaction) -> DbResult<()>;

    async fn rollback(&self, tx: DdlTransaction) -> DbResult<()>;

    /// Whether DDL issued after a row change in the same transaction needs
    /// those rows committed first.
    fn ddl_needs_committed_rows(&self) -> bool {
        false
    }

    /// Execute one DDL statement
    async fn execute_ddl(&self, statement: &str) -> DbResult<()>;

    /// Check if a table or view exists
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    async fn create_entity(&self, entity: &EntityState) -> DbResult<()>;

    async fn delete_entity(&self, entity: &EntityState) -> DbResult<()>;

    async fn rename_entity(&self, before: &EntityState, after: &EntityState) -> DbResult<()>;

    async fn add_field(
        &self,
        before: &EntityState,
        after: &EntityState,
        field: &FieldState,
    ) -> DbResult<()>;

    async fn remove_field(
        &self,
        before: &EntityState,
        after: &EntityState,
        field: &FieldName,
    ) -> DbResult<()>;

    async fn alter_field(
        &self,
        before: &EntityState,
        after: &EntityState,
        old: &FieldState,
        new: &FieldState,
    ) -> DbResult<()>;

    async fn rename_field(
        &self,
        before: &EntityState,
        after: &EntityState,
        old: &FieldName,
        new: &FieldName,
    ) -> DbResult<()>;
}

/// Row access used by data operations.
///
/// Filters are conjunctions of column equalities; a JSON `null` matches
/// `IS NULL`. Rows are shaped by the entity snapshot passed in, not by the
/// live table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Execute SQL that modifies data, returns affected rows
    async fn execute_sql(&self, sql: &str) -> DbResult<usize>;

    /// Run a query and return every row keyed by column name
    async fn query_sql(&self, sql: &str) -> DbResult<Vec<Row>>;

    async fn select_rows(&self, entity: &EntityState, filter: &Row) -> DbResult<Vec<Row>>;

    async fn insert_row(&self, entity: &EntityState, row: &Row) -> DbResult<()>;

    async fn update_rows(&self, entity: &EntityState, changes: &Row, filter: &Row)
        -> DbResult<usize>;

    async fn delete_rows(&self, entity: &EntityState, filter: &Row) -> DbResult<usize>;

    async fn count_rows(&self, entity: &EntityState, filter: &Row) -> DbResult<usize>;
}

/// Durable record of applied migrations for one database alias.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create the ledger table if it does not exist
    async fn ensure_ledger(&self) -> DbResult<()>;

    /// Every entry recorded for this alias, oldest first
    async fn ledger_entries(&self) -> DbResult<Vec<LedgerEntry>>;

    async fn record_applied(&self, migration: &MigrationKey) -> DbResult<LedgerEntry>;

    /// Record that a non-transactional run stopped at `operation`
    async fn record_partial(
        &self,
        migration: &MigrationKey,
        operation: usize,
    ) -> DbResult<LedgerEntry>;

    /// Remove the entry for `migration`, if any
    async fn erase(&self, migration: &MigrationKey) -> DbResult<()>;
}

/// Everything the engine needs from one database.
pub trait Backend: SchemaEditor + RecordStore + LedgerStore {}

impl<T: SchemaEditor + RecordStore + LedgerStore> Backend for T {}
