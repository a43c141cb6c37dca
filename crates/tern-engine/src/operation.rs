//! Operations: the atomic steps of a migration.
//!
//! An [`Operation`] is either a schema change, whose state transform is
//! pure and whose database effect is delegated to the [`SchemaEditor`], or a
//! data change, which leaves the virtual schema alone and runs SQL or an
//! injected callback against the connection.
//!
//! [`SchemaEditor`]: tern_db::SchemaEditor

use crate::accessor::ModelAccessor;
use crate::error::{EngineError, EngineResult};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tern_core::{
    CoreResult, DatabaseAlias, EntityName, Hints, MigrationKey, ProjectState, SchemaChange,
};
use tern_db::{Backend, RecordStore, SchemaEditor};

/// What an operation can see of the database it runs against.
#[derive(Clone, Copy)]
pub struct ConnectionContext<'a> {
    pub alias: &'a DatabaseAlias,
    pub migration: &'a MigrationKey,
    /// Position of the operation inside its migration
    pub operation: usize,
    pub backend: &'a dyn Backend,
    /// Migration hints merged with operation hints
    pub hints: &'a Hints,
}

impl fmt::Debug for ConnectionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("alias", self.alias)
            .field("migration", self.migration)
            .field("operation", &self.operation)
            .field("hints", self.hints)
            .finish()
    }
}

/// Argument handed to data callbacks.
pub struct DataContext<'a> {
    /// Entities as the migration has shaped them at this point
    pub models: ModelAccessor<'a>,
    pub connection: ConnectionContext<'a>,
}

type DataFn =
    dyn for<'a> Fn(DataContext<'a>) -> BoxFuture<'a, EngineResult<()>> + Send + Sync + 'static;

/// An injected data-migration function.
///
/// ```ignore
/// DataCallback::new(|ctx| {
///     async move {
///         let products = ctx.models.entity("product")?;
///         products.update_where(&filter, &changes).await?;
///         Ok(())
///     }
///     .boxed()
/// })
/// ```
#[derive(Clone)]
pub struct DataCallback(Arc<DataFn>);

impl DataCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(DataContext<'a>) -> BoxFuture<'a, EngineResult<()>> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// A callback that does nothing; marks a data change as reversible.
    pub fn noop() -> Self {
        Self::new(|_| Box::pin(async { Ok(()) }))
    }

    pub async fn call(&self, ctx: DataContext<'_>) -> EngineResult<()> {
        (self.0)(ctx).await
    }
}

impl fmt::Debug for DataCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataCallback")
    }
}

/// A change to the rows of the database.
#[derive(Debug, Clone)]
pub enum DataChange {
    /// Raw SQL. `backward: None` is irreversible; `Some(vec![])` reverses as a no-op.
    Sql {
        forward: Vec<String>,
        backward: Option<Vec<String>>,
    },
    Callback {
        forward: DataCallback,
        backward: Option<DataCallback>,
        description: String,
    },
}

#[derive(Debug, Clone)]
pub enum OperationKind {
    Schema(SchemaChange),
    Data(DataChange),
}

/// One atomic step of a migration.
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    /// Routing hints; override the migration's hints per key
    pub hints: Hints,
}

impl From<SchemaChange> for Operation {
    fn from(change: SchemaChange) -> Self {
        Operation::schema(change)
    }
}

impl Operation {
    pub fn schema(change: SchemaChange) -> Self {
        Self {
            kind: OperationKind::Schema(change),
            hints: Hints::new(),
        }
    }

    /// Raw SQL data change.
    pub fn sql(forward: Vec<String>, backward: Option<Vec<String>>) -> Self {
        Self {
            kind: OperationKind::Data(DataChange::Sql { forward, backward }),
            hints: Hints::new(),
        }
    }

    /// Callback data change.
    pub fn callback(
        description: impl Into<String>,
        forward: DataCallback,
        backward: Option<DataCallback>,
    ) -> Self {
        Self {
            kind: OperationKind::Data(DataChange::Callback {
                forward,
                backward,
                description: description.into(),
            }),
            hints: Hints::new(),
        }
    }

    pub fn with_hints(mut self, hints: Hints) -> Self {
        self.hints = hints;
        self
    }

    pub fn is_schema(&self) -> bool {
        matches!(self.kind, OperationKind::Schema(_))
    }

    /// Whether the operation declares backward behavior.
    pub fn is_reversible(&self) -> bool {
        match &self.kind {
            OperationKind::Schema(_) => true,
            OperationKind::Data(DataChange::Sql { backward, .. }) => backward.is_some(),
            OperationKind::Data(DataChange::Callback { backward, .. }) => backward.is_some(),
        }
    }

    /// Entity a schema change targets.
    pub fn entity(&self) -> Option<&EntityName> {
        match &self.kind {
            OperationKind::Schema(change) => Some(change.entity()),
            OperationKind::Data(_) => None,
        }
    }

    pub fn description(&self) -> String {
        match &self.kind {
            OperationKind::Schema(change) => change.to_string(),
            OperationKind::Data(DataChange::Sql { forward, .. }) => {
                format!("Run {} SQL statement(s)", forward.len())
            }
            OperationKind::Data(DataChange::Callback { description, .. }) => description.clone(),
        }
    }

    /// Pure forward state transform. Data changes leave the state alone.
    pub fn state_forward(&self, state: &mut ProjectState, migration: &MigrationKey) -> CoreResult<()> {
        match &self.kind {
            OperationKind::Schema(change) => change.state_forward(&migration.namespace, state),
            OperationKind::Data(_) => Ok(()),
        }
    }

    /// Pure backward state transform; `before` is the state the operation
    /// was originally applied to.
    pub fn state_backward(
        &self,
        state: &mut ProjectState,
        before: &ProjectState,
        migration: &MigrationKey,
    ) -> CoreResult<()> {
        match &self.kind {
            OperationKind::Schema(change) => {
                change.state_backward(&migration.namespace, state, before)
            }
            OperationKind::Data(_) => Ok(()),
        }
    }

    /// Apply the operation to `state_before` and the connection; return the
    /// resulting state.
    pub async fn apply_forward(
        &self,
        state_before: &ProjectState,
        ctx: ConnectionContext<'_>,
    ) -> EngineResult<ProjectState> {
        let mut state_after = state_before.clone();
        self.state_forward(&mut state_after, ctx.migration)?;
        self.database_forward(state_before, &state_after, ctx).await?;
        Ok(state_after)
    }

    /// Undo the operation. `state_before_reverse` is the current state and
    /// `original_before` the state the operation was applied to.
    pub async fn apply_backward(
        &self,
        state_before_reverse: &ProjectState,
        original_before: &ProjectState,
        ctx: ConnectionContext<'_>,
    ) -> EngineResult<ProjectState> {
        let mut state_after = state_before_reverse.clone();
        self.state_backward(&mut state_after, original_before, ctx.migration)?;
        self.database_backward(state_before_reverse, &state_after, original_before, ctx)
            .await?;
        Ok(state_after)
    }

    /// Database half of [`apply_forward`](Self::apply_forward).
    pub async fn database_forward(
        &self,
        before: &ProjectState,
        after: &ProjectState,
        ctx: ConnectionContext<'_>,
    ) -> EngineResult<()> {
        match &self.kind {
            OperationKind::Schema(change) => {
                run_schema_change(change, before, after, ctx).await
            }
            OperationKind::Data(DataChange::Sql { forward, .. }) => {
                run_sql(forward, ctx).await
            }
            OperationKind::Data(DataChange::Callback { forward, .. }) => {
                forward.call(data_context(before, ctx)).await
            }
        }
    }

    /// Database half of [`apply_backward`](Self::apply_backward).
    pub async fn database_backward(
        &self,
        current: &ProjectState,
        reverted: &ProjectState,
        original_before: &ProjectState,
        ctx: ConnectionContext<'_>,
    ) -> EngineResult<()> {
        match &self.kind {
            OperationKind::Schema(change) => {
                let reverse = change.reverse(&ctx.migration.namespace, original_before)?;
                run_schema_change(&reverse, current, reverted, ctx).await
            }
            OperationKind::Data(DataChange::Sql {
                backward: Some(backward),
                ..
            }) => run_sql(backward, ctx).await,
            OperationKind::Data(DataChange::Callback {
                backward: Some(backward),
                ..
            }) => backward.call(data_context(current, ctx)).await,
            OperationKind::Data(_) => Err(EngineError::Irreversible {
                migration: ctx.migration.clone(),
                operation: ctx.operation,
                description: self.description(),
            }),
        }
    }
}

fn data_context<'a>(state: &'a ProjectState, ctx: ConnectionContext<'a>) -> DataContext<'a> {
    DataContext {
        models: ModelAccessor::new(state, &ctx.migration.namespace, ctx.backend),
        connection: ctx,
    }
}

async fn run_sql(statements: &[String], ctx: ConnectionContext<'_>) -> EngineResult<()> {
    for statement in statements {
        ctx.backend.execute_sql(statement).await?;
    }
    Ok(())
}

/// Issue the DDL for `change`, which turned `before` into `after`.
async fn run_schema_change(
    change: &SchemaChange,
    before: &ProjectState,
    after: &ProjectState,
    ctx: ConnectionContext<'_>,
) -> EngineResult<()> {
    let ns = &ctx.migration.namespace;
    let editor = ctx.backend;
    match change {
        SchemaChange::CreateEntity { name, .. } => {
            editor.create_entity(after.require_entity(ns, name)?).await?;
        }
        SchemaChange::DeleteEntity { name } => {
            editor.delete_entity(before.require_entity(ns, name)?).await?;
        }
        SchemaChange::RenameEntity { old_name, new_name } => {
            editor
                .rename_entity(
                    before.require_entity(ns, old_name)?,
                    after.require_entity(ns, new_name)?,
                )
                .await?;
        }
        SchemaChange::AddField { entity, field } => {
            editor
                .add_field(
                    before.require_entity(ns, entity)?,
                    after.require_entity(ns, entity)?,
                    field,
                )
                .await?;
        }
        SchemaChange::RemoveField { entity, name } => {
            editor
                .remove_field(
                    before.require_entity(ns, entity)?,
                    after.require_entity(ns, entity)?,
                    name,
                )
                .await?;
        }
        SchemaChange::AlterField { entity, field } => {
            let old_entity = before.require_entity(ns, entity)?;
            let old = old_entity.require_field(&field.name)?;
            editor
                .alter_field(old_entity, after.require_entity(ns, entity)?, old, field)
                .await?;
        }
        SchemaChange::RenameField {
            entity,
            old_name,
            new_name,
        } => {
            editor
                .rename_field(
                    before.require_entity(ns, entity)?,
                    after.require_entity(ns, entity)?,
                    old_name,
                    new_name,
                )
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "operation_test.rs"]
mod tests;
