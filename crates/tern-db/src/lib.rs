//! tern-db - Database collaborators for tern
//!
//! This crate provides the traits the migration engine consumes
//! (`SchemaEditor`, `RecordStore`, `LedgerStore`) and their DuckDB
//! implementation.

pub mod ddl;
pub mod duckdb;
pub mod error;
pub mod traits;
pub mod value;

pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use traits::{
    Backend, DdlTransaction, LedgerStore, RecordStore, SchemaEditor, TransactionSupport,
};
pub use value::Row;
