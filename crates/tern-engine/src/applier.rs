//! Applier/Ledger: runs planned migrations against one database alias.
//!
//! Per `(alias, migration)` the applier moves `Pending -> Applying -> Applied`
//! forward and `Applied -> Reversing -> Pending` backward. The ledger write
//! happens inside the migration's DDL transaction when the backend offers
//! one, so ledger and schema commit together. Without a transaction a failure
//! after the first operation leaves a `partial` ledger entry that blocks the
//! alias until an operator resolves it.

use crate::error::{EngineError, EngineResult};
use crate::migration::Migration;
use crate::operation::{ConnectionContext, Operation};
use crate::planner::{BackwardPlan, Direction, Planner};
use crate::projector;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tern_core::{
    DatabaseAlias, Hints, LedgerStatus, MigrationKey, ProjectState, RouteRequest, RouterChain,
};
use tern_db::{Backend, DdlTransaction, LedgerStore, SchemaEditor, TransactionSupport};

/// Cooperative cancellation flag, checked between migrations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one planned migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationOutcome {
    Applied,
    Unapplied,
    /// Forward plan entry already in the ledger
    AlreadyApplied,
    /// Backward plan entry not in the ledger
    NotApplied,
    /// Skipped for this alias by the router chain
    Routed,
}

impl MigrationOutcome {
    /// Whether the migration touched the database.
    pub fn executed(self) -> bool {
        matches!(self, MigrationOutcome::Applied | MigrationOutcome::Unapplied)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub migration: MigrationKey,
    pub outcome: MigrationOutcome,
    pub duration: Duration,
}

/// Result of one applier run.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub alias: DatabaseAlias,
    pub direction: Direction,
    pub outcomes: Vec<MigrationReport>,
}

impl ApplyReport {
    fn new(alias: &DatabaseAlias, direction: Direction) -> Self {
        Self {
            alias: alias.clone(),
            direction,
            outcomes: Vec::new(),
        }
    }

    fn push(&mut self, migration: &MigrationKey, outcome: MigrationOutcome, duration: Duration) {
        self.outcomes.push(MigrationReport {
            migration: migration.clone(),
            outcome,
            duration,
        });
    }

    /// Migrations that ran against the database, in run order.
    pub fn executed(&self) -> Vec<&MigrationKey> {
        self.outcomes
            .iter()
            .filter(|r| r.outcome.executed())
            .map(|r| &r.migration)
            .collect()
    }

    pub fn count(&self, outcome: MigrationOutcome) -> usize {
        self.outcomes.iter().filter(|r| r.outcome == outcome).count()
    }

    /// True when nothing touched the database.
    pub fn is_noop(&self) -> bool {
        self.executed().is_empty()
    }
}

/// Applies plans to one database alias.
pub struct Applier<'a> {
    alias: &'a DatabaseAlias,
    backend: &'a dyn Backend,
    planner: &'a Planner,
    routers: &'a RouterChain,
    cancel: CancelToken,
}

impl<'a> Applier<'a> {
    pub fn new(
        alias: &'a DatabaseAlias,
        backend: &'a dyn Backend,
        planner: &'a Planner,
        routers: &'a RouterChain,
    ) -> Self {
        Self {
            alias,
            backend,
            planner,
            routers,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Walk a forward plan.
    ///
    /// Already-applied and routed migrations still advance the projected
    /// state. The first failure stops the plan.
    pub async fn apply(&self, plan: &[MigrationKey]) -> EngineResult<ApplyReport> {
        let applied = self.applied().await?;
        let mut report = ApplyReport::new(self.alias, Direction::Forward);
        let mut state = ProjectState::new();

        for key in plan {
            let migration = self.planner.migration(key)?;

            if applied.contains(key) {
                log::debug!("{} already applied on '{}'", key, self.alias);
                projector::advance(&mut state, migration)?;
                report.push(key, MigrationOutcome::AlreadyApplied, Duration::ZERO);
                continue;
            }

            self.checkpoint(&report)?;

            if !self.migration_allowed(migration) {
                log::info!("Skipping {} on '{}' (routed away)", key, self.alias);
                projector::advance(&mut state, migration)?;
                report.push(key, MigrationOutcome::Routed, Duration::ZERO);
                continue;
            }

            let started = Instant::now();
            state = self.run_forward(&state, migration).await?;
            let elapsed = started.elapsed();
            log::info!(
                "Applied {} on '{}' ({:.2}s)",
                key,
                self.alias,
                elapsed.as_secs_f64()
            );
            report.push(key, MigrationOutcome::Applied, elapsed);
        }

        Ok(report)
    }

    /// Walk a backward plan, newest migration first.
    pub async fn unapply(&self, plan: &BackwardPlan) -> EngineResult<ApplyReport> {
        let applied = self.applied().await?;
        let mut report = ApplyReport::new(self.alias, Direction::Backward);
        let snapshots = self.step_snapshots(plan)?;

        for key in &plan.steps {
            let migration = self.planner.migration(key)?;

            if !applied.contains(key) {
                log::debug!("{} not applied on '{}'", key, self.alias);
                report.push(key, MigrationOutcome::NotApplied, Duration::ZERO);
                continue;
            }

            self.checkpoint(&report)?;

            if !self.migration_allowed(migration) {
                log::info!("Skipping {} on '{}' (routed away)", key, self.alias);
                report.push(key, MigrationOutcome::Routed, Duration::ZERO);
                continue;
            }

            let Some(states) = snapshots.get(key) else {
                return Err(tern_core::CoreError::MigrationNotFound {
                    key: key.to_string(),
                }
                .into());
            };

            let started = Instant::now();
            self.run_backward(migration, states).await?;
            let elapsed = started.elapsed();
            log::info!(
                "Unapplied {} on '{}' ({:.2}s)",
                key,
                self.alias,
                elapsed.as_secs_f64()
            );
            report.push(key, MigrationOutcome::Unapplied, elapsed);
        }

        Ok(report)
    }

    /// Applied set of this alias; a partial entry stops the run.
    async fn applied(&self) -> EngineResult<BTreeSet<MigrationKey>> {
        self.backend.ensure_ledger().await?;
        let mut applied = BTreeSet::new();
        for entry in self.backend.ledger_entries().await? {
            if let LedgerStatus::Partial { operation } = entry.status {
                return Err(EngineError::UnresolvedPartial {
                    alias: self.alias.clone(),
                    migration: entry.migration,
                    operation,
                });
            }
            applied.insert(entry.migration);
        }
        Ok(applied)
    }

    fn checkpoint(&self, report: &ApplyReport) -> EngineResult<()> {
        if self.cancel.is_cancelled() {
            let completed = report.executed().len();
            log::warn!(
                "Run on '{}' cancelled after {} migration(s)",
                self.alias,
                completed
            );
            return Err(EngineError::Cancelled {
                alias: self.alias.clone(),
                completed,
            });
        }
        Ok(())
    }

    fn migration_allowed(&self, migration: &Migration) -> bool {
        self.routers.allow(&RouteRequest {
            database: self.alias,
            namespace: migration.namespace(),
            entity: None,
            hints: &migration.hints,
        })
    }

    /// Operations without their own hints follow the migration's verdict.
    fn operation_allowed(&self, migration: &Migration, operation: &Operation, hints: &Hints) -> bool {
        if operation.hints.is_empty() {
            return true;
        }
        self.routers.allow(&RouteRequest {
            database: self.alias,
            namespace: migration.namespace(),
            entity: operation.entity(),
            hints,
        })
    }

    async fn begin(&self, migration: &Migration) -> EngineResult<Option<DdlTransaction>> {
        if !migration.atomic {
            log::debug!("{} opts out of a DDL transaction", migration.key);
            return Ok(None);
        }
        match self.backend.begin_ddl_transaction().await? {
            TransactionSupport::Begun(tx) => Ok(Some(tx)),
            TransactionSupport::NotSupported => {
                log::debug!(
                    "'{}' ({}) has no transactional DDL; running {} without one",
                    self.alias,
                    self.backend.db_type(),
                    migration.key
                );
                Ok(None)
            }
        }
    }

    async fn run_forward(
        &self,
        start: &ProjectState,
        migration: &Migration,
    ) -> EngineResult<ProjectState> {
        let mut run = Run::new(self.begin(migration).await?);
        log::debug!("{} on '{}': applying", migration.key, self.alias);

        let outcome = match self.forward_operations(start, migration, &mut run).await {
            Ok(state) => match self.backend.record_applied(&migration.key).await {
                Ok(_) => Ok(state),
                Err(e) => Err((migration.operations.len(), EngineError::from(e))),
            },
            Err(failure) => Err(failure),
        };

        match outcome {
            Ok(state) => {
                if let Some(tx) = run.tx {
                    self.backend.commit(tx).await?;
                }
                Ok(state)
            }
            Err((index, error)) => Err(self.fail(migration, run, index, error).await),
        }
    }

    async fn forward_operations(
        &self,
        start: &ProjectState,
        migration: &Migration,
        run: &mut Run,
    ) -> Result<ProjectState, (usize, EngineError)> {
        let mut state = start.clone();
        for (index, operation) in migration.operations.iter().enumerate() {
            run.reached(index);
            let hints = migration.operation_hints(operation);
            let mut after = state.clone();
            operation
                .state_forward(&mut after, &migration.key)
                .map_err(|e| (index, EngineError::from(e)))?;

            if self.operation_allowed(migration, operation, &hints) {
                self.settle_rows(migration, operation, index, run)
                    .await
                    .map_err(|e| (index, e))?;
                log::debug!("  [{}] {}", index, operation.description());
                operation
                    .database_forward(&state, &after, self.context(migration, index, &hints))
                    .await
                    .map_err(|e| (index, e))?;
                run.executed(operation);
            } else {
                log::debug!("  [{}] {} (routed away)", index, operation.description());
            }
            state = after;
        }
        run.reached(migration.operations.len());
        Ok(state)
    }

    /// `states[i]` is the state operation `i` was applied to.
    async fn run_backward(&self, migration: &Migration, states: &[ProjectState]) -> EngineResult<()> {
        let mut run = Run::new(self.begin(migration).await?);
        log::debug!("{} on '{}': reversing", migration.key, self.alias);

        let outcome = match self.backward_operations(migration, states, &mut run).await {
            Ok(()) => self
                .backend
                .erase(&migration.key)
                .await
                .map_err(|e| (migration.operations.len(), EngineError::from(e))),
            Err(failure) => Err(failure),
        };

        match outcome {
            Ok(()) => {
                if let Some(tx) = run.tx {
                    self.backend.commit(tx).await?;
                }
                Ok(())
            }
            Err((index, error)) => Err(self.fail(migration, run, index, error).await),
        }
    }

    async fn backward_operations(
        &self,
        migration: &Migration,
        states: &[ProjectState],
        run: &mut Run,
    ) -> Result<(), (usize, EngineError)> {
        for (index, operation) in migration.operations.iter().enumerate().rev() {
            run.reached(index);
            let (Some(original_before), Some(current)) = (states.get(index), states.get(index + 1))
            else {
                return Err((
                    index,
                    tern_core::CoreError::MigrationNotFound {
                        key: migration.key.to_string(),
                    }
                    .into(),
                ));
            };
            let hints = migration.operation_hints(operation);
            let mut reverted = current.clone();
            operation
                .state_backward(&mut reverted, original_before, &migration.key)
                .map_err(|e| (index, EngineError::from(e)))?;

            if self.operation_allowed(migration, operation, &hints) {
                self.settle_rows(migration, operation, index, run)
                    .await
                    .map_err(|e| (index, e))?;
                log::debug!("  [{}] undo {}", index, operation.description());
                operation
                    .database_backward(
                        current,
                        &reverted,
                        original_before,
                        self.context(migration, index, &hints),
                    )
                    .await
                    .map_err(|e| (index, e))?;
                run.executed(operation);
            }
        }
        Ok(())
    }

    /// Commit pending row changes and reopen the transaction before a schema
    /// change on a backend that cannot alter tables with uncommitted rows.
    async fn settle_rows(
        &self,
        migration: &Migration,
        operation: &Operation,
        index: usize,
        run: &mut Run,
    ) -> EngineResult<()> {
        if !operation.is_schema() || !run.pending_rows || !self.backend.ddl_needs_committed_rows() {
            return Ok(());
        }
        let Some(tx) = run.tx.take() else {
            return Ok(());
        };
        log::info!(
            "{} on '{}': committing row changes before operation {}",
            migration.key,
            self.alias,
            index
        );
        self.backend.commit(tx).await?;
        run.committed(index);
        run.tx = self.begin(migration).await?;
        Ok(())
    }

    /// Turn an operation failure into the error the caller sees.
    ///
    /// The open transaction, if any, is rolled back. When nothing the run
    /// did has reached the database durably the migration stays unapplied;
    /// otherwise it is recorded as partially applied.
    async fn fail(
        &self,
        migration: &Migration,
        run: Run,
        index: usize,
        error: EngineError,
    ) -> EngineError {
        let description = migration
            .operations
            .get(index)
            .map(Operation::description)
            .unwrap_or_else(|| "ledger write".to_string());

        let rolled_back = run.tx.is_some();
        if let Some(tx) = run.tx {
            if let Err(e) = self.backend.rollback(tx).await {
                log::warn!("Rollback on '{}' failed: {}", self.alias, e);
            }
        }

        if !run.durable {
            return EngineError::OperationFailed {
                alias: self.alias.clone(),
                migration: migration.key.clone(),
                operation: index,
                description,
                reason: error.to_string(),
                rolled_back,
            };
        }

        if let Err(e) = self.backend.record_partial(&migration.key, run.resume_at).await {
            log::warn!(
                "Could not record partial state of {} on '{}': {}",
                migration.key,
                self.alias,
                e
            );
        }
        EngineError::PartiallyApplied {
            alias: self.alias.clone(),
            migration: migration.key.clone(),
            operation: index,
            description,
            reason: error.to_string(),
        }
    }

    fn context<'c>(
        &'c self,
        migration: &'c Migration,
        index: usize,
        hints: &'c Hints,
    ) -> ConnectionContext<'c> {
        ConnectionContext {
            alias: self.alias,
            migration: &migration.key,
            operation: index,
            backend: self.backend,
            hints,
        }
    }

    /// Per-operation snapshots for every step of `plan`.
    fn step_snapshots(
        &self,
        plan: &BackwardPlan,
    ) -> EngineResult<HashMap<MigrationKey, Vec<ProjectState>>> {
        let steps: BTreeSet<&MigrationKey> = plan.steps.iter().collect();
        let mut snapshots = HashMap::new();
        let mut state = ProjectState::new();

        for key in &plan.context {
            let migration = self.planner.migration(key)?;
            if steps.contains(key) {
                let states = projector::snapshots(&state, migration)?;
                if let Some(last) = states.last() {
                    state = last.clone();
                }
                snapshots.insert(key.clone(), states);
            } else {
                projector::advance(&mut state, migration)?;
            }
        }
        Ok(snapshots)
    }
}

/// What one migration run has done to its database so far.
struct Run {
    tx: Option<DdlTransaction>,
    /// Operation index recorded in the ledger if the run ends partially
    resume_at: usize,
    /// Some executed operation has been committed or ran without a transaction
    durable: bool,
    /// The open transaction holds an executed operation
    pending: bool,
    /// The open transaction holds a row change
    pending_rows: bool,
}

impl Run {
    fn new(tx: Option<DdlTransaction>) -> Self {
        Self {
            tx,
            resume_at: 0,
            durable: false,
            pending: false,
            pending_rows: false,
        }
    }

    /// Without a transaction every operation before `index` is final.
    fn reached(&mut self, index: usize) {
        if self.tx.is_none() {
            self.resume_at = index;
        }
    }

    fn executed(&mut self, operation: &Operation) {
        if self.tx.is_none() {
            self.durable = true;
        } else {
            self.pending = true;
            self.pending_rows |= !operation.is_schema();
        }
    }

    /// The transaction was committed just before operation `index`.
    fn committed(&mut self, index: usize) {
        self.durable |= self.pending;
        self.resume_at = index;
        self.pending = false;
        self.pending_rows = false;
    }
}

#[cfg(test)]
#[path = "applier_test.rs"]
mod tests;
