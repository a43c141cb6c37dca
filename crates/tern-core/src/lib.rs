//! tern-core - Core library for tern
//!
//! This crate provides the pure building blocks of the migration engine:
//! strongly-typed names, the virtual schema model ([`ProjectState`]), schema
//! changes and their state transforms, the migration dependency graph,
//! routing policies and project configuration. Nothing here touches a live
//! database connection.

pub mod config;
pub mod error;
pub mod graph;
pub mod hints;
pub mod key;
pub mod ledger;
pub mod names;
mod newtype_string;
pub mod router;
pub mod schema_change;
pub mod state;

pub use config::{Config, DatabaseConfig, RouterConfig};
pub use error::{CoreError, CoreResult};
pub use graph::MigrationGraph;
pub use hints::Hints;
pub use key::{MigrationKey, Target};
pub use ledger::{LedgerEntry, LedgerStatus};
pub use names::{DatabaseAlias, EntityName, FieldName, MigrationName, Namespace};
pub use router::{HintRouter, NamespaceRouter, RouteRequest, Router, RouterChain};
pub use schema_change::SchemaChange;
pub use state::{EntityKey, EntityState, FieldState, FieldType, ProjectState};
