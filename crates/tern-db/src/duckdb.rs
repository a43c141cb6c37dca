//! DuckDB database backend implementation

use crate::ddl;
use crate::error::{DbError, DbResult};
use crate::traits::{DdlTransaction, LedgerStore, RecordStore, SchemaEditor, TransactionSupport};
use crate::value::{read_typed, read_untyped, Row};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use duckdb::{params, Connection};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tern_core::{
    DatabaseAlias, EntityState, FieldName, FieldState, LedgerEntry, LedgerStatus, MigrationKey,
    MigrationName, Namespace,
};

const DEFAULT_LEDGER_TABLE: &str = "tern_ledger";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// DuckDB database backend for one alias
pub struct DuckDbBackend {
    alias: DatabaseAlias,
    conn: Mutex<Connection>,
    transactional: bool,
    ledger_table: String,
    in_transaction: AtomicBool,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory(alias: DatabaseAlias) -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::with_connection(alias, conn))
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(alias: DatabaseAlias, path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::with_connection(alias, conn))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(alias: DatabaseAlias, path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory(alias)
        } else {
            Self::from_path(alias, Path::new(path))
        }
    }

    fn with_connection(alias: DatabaseAlias, conn: Connection) -> Self {
        Self {
            alias,
            conn: Mutex::new(conn),
            transactional: true,
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
            in_transaction: AtomicBool::new(false),
        }
    }

    /// Turn DDL transactions on or off (on by default).
    pub fn with_transactional_ddl(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    pub fn with_ledger_table(mut self, table: impl Into<String>) -> Self {
        self.ledger_table = table.into();
        self
    }

    pub fn ledger_table(&self) -> &str {
        &self.ledger_table
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Execute SQL synchronously
    fn execute_sync(&self, sql: &str) -> DbResult<usize> {
        log::debug!("[{}] {}", self.alias, sql);
        let conn = self.lock()?;
        conn.execute(sql, [])
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))
    }

    /// Execute batch SQL synchronously
    fn execute_batch_sync(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| DbError::ExecutionError(e.to_string()))
    }

    fn execute_all(&self, statements: &[String]) -> DbResult<()> {
        for statement in statements {
            self.execute_sync(statement)?;
        }
        Ok(())
    }

    /// Check if relation exists synchronously
    fn relation_exists_sync(&self, name: &str) -> DbResult<bool> {
        let conn = self.lock()?;

        // Handle schema-qualified names
        let (schema, table) = match name.rsplit_once('.') {
            Some((schema, table)) => (schema, table),
            None => ("main", name),
        };

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
            params![schema, table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn select_sync(&self, entity: &EntityState, filter: &Row) -> DbResult<Vec<Row>> {
        let sql = format!(
            "SELECT {} FROM {}{}",
            ddl::select_list(entity),
            ddl::quote_ident(&entity.table),
            ddl::where_clause(entity, filter)
        );
        log::debug!("[{}] {}", self.alias, sql);

        let fields = entity.ordered_fields();
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                let mut out = Row::new();
                for (idx, field) in fields.iter().enumerate() {
                    out.insert(
                        field.name.to_string(),
                        read_typed(row, idx, field.field_type)?,
                    );
                }
                Ok(out)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_sync(&self, sql: &str) -> DbResult<Vec<Row>> {
        log::debug!("[{}] {}", self.alias, sql);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        // DuckDB panics on stmt.column_count() before execution, so read the
        // column metadata from inside query_map.
        let rows = stmt
            .query_map([], |row| {
                let stmt = row.as_ref();
                let mut out = Row::new();
                for idx in 0..stmt.column_count() {
                    let name = stmt
                        .column_name(idx)
                        .map_or_else(|_| format!("column{idx}"), |n| n.to_string());
                    out.insert(name, read_untyped(row, idx));
                }
                Ok(out)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn write_ledger(
        &self,
        migration: &MigrationKey,
        status: LedgerStatus,
    ) -> DbResult<LedgerEntry> {
        let applied_at = Utc::now().trunc_subsecs(6);
        let failed_operation = status
            .failed_operation()
            .map(|op| i64::try_from(op).unwrap_or(i64::MAX));
        let sql = format!(
            "INSERT OR REPLACE INTO {} (database_alias, namespace, name, status, failed_operation, applied_at) \
             VALUES (?, ?, ?, ?, ?, CAST(? AS TIMESTAMP))",
            ddl::quote_ident(&self.ledger_table)
        );
        let conn = self.lock()?;
        conn.execute(
            &sql,
            params![
                self.alias.as_str(),
                migration.namespace.as_str(),
                migration.name.as_str(),
                status.as_str(),
                failed_operation,
                applied_at.format(TIMESTAMP_FORMAT).to_string(),
            ],
        )?;
        Ok(LedgerEntry {
            database_alias: self.alias.clone(),
            migration: migration.clone(),
            applied_at,
            status,
        })
    }

    fn read_ledger(&self) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT namespace, name, status, failed_operation, CAST(applied_at AS VARCHAR) \
             FROM {} WHERE database_alias = ? ORDER BY applied_at, namespace, name",
            ddl::quote_ident(&self.ledger_table)
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params![self.alias.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(raw.len());
        for (namespace, name, status, failed_operation, applied_at) in raw {
            let (Some(namespace), Some(name)) =
                (Namespace::try_new(namespace), MigrationName::try_new(name))
            else {
                log::warn!("Ignoring ledger row with an empty migration key");
                continue;
            };
            let migration = MigrationKey { namespace, name };
            let Some(status) = LedgerStatus::from_columns(&status, failed_operation) else {
                log::warn!("Ignoring ledger row for {migration} with unknown status '{status}'");
                continue;
            };
            entries.push(LedgerEntry {
                database_alias: self.alias.clone(),
                migration,
                applied_at: parse_timestamp(&applied_at)?,
                status,
            });
        }
        Ok(entries)
    }
}

fn parse_timestamp(value: &str) -> DbResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| DbError::Ledger(format!("bad applied_at '{value}': {e}")))
}

#[async_trait]
impl SchemaEditor for DuckDbBackend {
    fn alias(&self) -> &DatabaseAlias {
        &self.alias
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }

    /// DuckDB refuses index and constraint changes on a table with
    /// uncommitted updates.
    fn ddl_needs_committed_rows(&self) -> bool {
        true
    }

    async fn begin_ddl_transaction(&self) -> DbResult<TransactionSupport> {
        if !self.transactional {
            return Ok(TransactionSupport::NotSupported);
        }
        if self.in_transaction.swap(true, Ordering::SeqCst) {
            return Err(DbError::TransactionError(format!(
                "a transaction is already open on '{}'",
                self.alias
            )));
        }
        if let Err(e) = self.execute_batch_sync("BEGIN TRANSACTION") {
            self.in_transaction.store(false, Ordering::SeqCst);
            return Err(DbError::TransactionError(format!("BEGIN failed: {e}")));
        }
        log::debug!("[{}] BEGIN TRANSACTION", self.alias);
        Ok(TransactionSupport::Begun(DdlTransaction::new(
            self.alias.clone(),
        )))
    }

    async fn commit(&self, tx: DdlTransaction) -> DbResult<()> {
        log::debug!("[{}] COMMIT", tx.alias());
        let result = self.execute_batch_sync("COMMIT");
        if let Err(commit_err) = result {
            let _ = self.execute_batch_sync("ROLLBACK");
            self.in_transaction.store(false, Ordering::SeqCst);
            return Err(DbError::TransactionError(format!(
                "COMMIT failed: {commit_err}"
            )));
        }
        self.in_transaction.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, tx: DdlTransaction) -> DbResult<()> {
        log::debug!("[{}] ROLLBACK", tx.alias());
        let result = self.execute_batch_sync("ROLLBACK");
        self.in_transaction.store(false, Ordering::SeqCst);
        result.map_err(|e| DbError::TransactionError(format!("ROLLBACK failed: {e}")))
    }

    async fn execute_ddl(&self, statement: &str) -> DbResult<()> {
        self.execute_sync(statement)?;
        Ok(())
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.relation_exists_sync(name)
    }

    async fn create_entity(&self, entity: &EntityState) -> DbResult<()> {
        self.execute_all(&ddl::create_entity(entity))
    }

    async fn delete_entity(&self, entity: &EntityState) -> DbResult<()> {
        self.execute_all(&ddl::delete_entity(entity))
    }

    async fn rename_entity(&self, before: &EntityState, after: &EntityState) -> DbResult<()> {
        self.execute_all(&ddl::rename_entity(before, after))
    }

    async fn add_field(
        &self,
        before: &EntityState,
        after: &EntityState,
        field: &FieldState,
    ) -> DbResult<()> {
        self.execute_all(&ddl::add_field(before, after, field)?)
    }

    async fn remove_field(
        &self,
        before: &EntityState,
        after: &EntityState,
        field: &FieldName,
    ) -> DbResult<()> {
        self.execute_all(&ddl::remove_field(before, after, field))
    }

    async fn alter_field(
        &self,
        before: &EntityState,
        after: &EntityState,
        old: &FieldState,
        new: &FieldState,
    ) -> DbResult<()> {
        self.execute_all(&ddl::alter_field(before, after, old, new)?)
    }

    async fn rename_field(
        &self,
        before: &EntityState,
        after: &EntityState,
        old: &FieldName,
        new: &FieldName,
    ) -> DbResult<()> {
        self.execute_all(&ddl::rename_field(before, after, old, new))
    }
}

#[async_trait]
impl RecordStore for DuckDbBackend {
    async fn execute_sql(&self, sql: &str) -> DbResult<usize> {
        self.execute_sync(sql)
    }

    async fn query_sql(&self, sql: &str) -> DbResult<Vec<Row>> {
        self.query_sync(sql)
    }

    async fn select_rows(&self, entity: &EntityState, filter: &Row) -> DbResult<Vec<Row>> {
        self.select_sync(entity, filter)
    }

    async fn insert_row(&self, entity: &EntityState, row: &Row) -> DbResult<()> {
        self.execute_sync(&ddl::insert(entity, row))?;
        Ok(())
    }

    async fn update_rows(
        &self,
        entity: &EntityState,
        changes: &Row,
        filter: &Row,
    ) -> DbResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE {} SET {}{}",
            ddl::quote_ident(&entity.table),
            ddl::set_clause(entity, changes),
            ddl::where_clause(entity, filter)
        );
        self.execute_sync(&sql)
    }

    async fn delete_rows(&self, entity: &EntityState, filter: &Row) -> DbResult<usize> {
        let sql = format!(
            "DELETE FROM {}{}",
            ddl::quote_ident(&entity.table),
            ddl::where_clause(entity, filter)
        );
        self.execute_sync(&sql)
    }

    async fn count_rows(&self, entity: &EntityState, filter: &Row) -> DbResult<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            ddl::quote_ident(&entity.table),
            ddl::where_clause(entity, filter)
        );
        let conn = self.lock()?;
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl LedgerStore for DuckDbBackend {
    async fn ensure_ledger(&self) -> DbResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                database_alias VARCHAR NOT NULL,
                namespace VARCHAR NOT NULL,
                name VARCHAR NOT NULL,
                status VARCHAR NOT NULL,
                failed_operation INTEGER,
                applied_at TIMESTAMP NOT NULL,
                PRIMARY KEY (database_alias, namespace, name)
            )",
            ddl::quote_ident(&self.ledger_table)
        );
        self.execute_batch_sync(&sql)
    }

    async fn ledger_entries(&self) -> DbResult<Vec<LedgerEntry>> {
        self.read_ledger()
    }

    async fn record_applied(&self, migration: &MigrationKey) -> DbResult<LedgerEntry> {
        self.write_ledger(migration, LedgerStatus::Applied)
    }

    async fn record_partial(
        &self,
        migration: &MigrationKey,
        operation: usize,
    ) -> DbResult<LedgerEntry> {
        self.write_ledger(migration, LedgerStatus::Partial { operation })
    }

    async fn erase(&self, migration: &MigrationKey) -> DbResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE database_alias = ? AND namespace = ? AND name = ?",
            ddl::quote_ident(&self.ledger_table)
        );
        let conn = self.lock()?;
        conn.execute(
            &sql,
            params![
                self.alias.as_str(),
                migration.namespace.as_str(),
                migration.name.as_str()
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
