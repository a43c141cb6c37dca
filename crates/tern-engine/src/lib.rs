//! tern-engine - Migration engine for tern
//!
//! This crate turns a set of [`Migration`]s into ordered plans and runs them:
//! - operations with pure state transforms and database effects
//! - the project state projector handing historical snapshots to data callbacks
//! - the planner over the dependency graph
//! - the applier, which keeps the per-alias ledger
//! - the [`Engine`] facade and the YAML migration loader

pub mod accessor;
pub mod applier;
pub mod engine;
pub mod error;
pub mod loader;
pub mod migration;
pub mod operation;
pub mod planner;
pub mod projector;

pub use accessor::{EntityHandle, ModelAccessor};
pub use applier::{Applier, ApplyReport, CancelToken, MigrationOutcome, MigrationReport};
pub use engine::{Engine, Resolution};
pub use error::{EngineError, EngineResult};
pub use migration::Migration;
pub use operation::{
    ConnectionContext, DataCallback, DataChange, DataContext, Operation, OperationKind,
};
pub use planner::{BackwardPlan, Direction, Planner};
