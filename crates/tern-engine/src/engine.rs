//! Engine facade: the plan request surface over planner, routers and backends.

use crate::applier::{Applier, ApplyReport, CancelToken};
use crate::error::{EngineError, EngineResult};
use crate::loader;
use crate::migration::Migration;
use crate::planner::{Direction, Planner};
use crate::projector;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tern_core::{
    Config, DatabaseAlias, LedgerEntry, MigrationKey, ProjectState, RouteRequest, RouterChain,
    Target,
};
use tern_db::{Backend, DuckDbBackend, LedgerStore};

/// Operator correction for one ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Record the migration as applied without running it
    MarkApplied,
    /// Drop the ledger entry without reversing anything
    MarkPending,
}

/// Migration engine over a fixed migration set and a set of databases.
pub struct Engine {
    planner: Planner,
    routers: RouterChain,
    backends: BTreeMap<DatabaseAlias, Arc<dyn Backend>>,
}

impl Engine {
    /// Validate `migrations` into a graph; no databases yet.
    pub fn new(migrations: Vec<Migration>) -> EngineResult<Self> {
        Ok(Self {
            planner: Planner::build(migrations)?,
            routers: RouterChain::new(),
            backends: BTreeMap::new(),
        })
    }

    /// Load migrations and open one DuckDB backend per configured alias.
    pub fn from_config(config: &Config, root: &Path) -> EngineResult<Self> {
        config.validate()?;
        let migrations = loader::load_migrations(&config.migration_paths_absolute(root))?;
        let mut engine = Self::new(migrations)?.with_routers(config.router_chain()?);

        for alias in config.aliases() {
            let db = config.database(&alias)?;
            let path = db.path_absolute(root);
            let backend = if db.is_in_memory() {
                DuckDbBackend::in_memory(alias.clone())?
            } else {
                DuckDbBackend::from_path(alias.clone(), &path)?
            }
            .with_transactional_ddl(db.transactional)
            .with_ledger_table(config.ledger_table.clone());
            log::debug!("Database '{}' at {}", alias, path.display());
            engine = engine.with_database(alias, Arc::new(backend));
        }
        Ok(engine)
    }

    pub fn with_routers(mut self, routers: RouterChain) -> Self {
        self.routers = routers;
        self
    }

    pub fn with_database(mut self, alias: DatabaseAlias, backend: Arc<dyn Backend>) -> Self {
        self.backends.insert(alias, backend);
        self
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn routers(&self) -> &RouterChain {
        &self.routers
    }

    pub fn aliases(&self) -> Vec<&DatabaseAlias> {
        self.backends.keys().collect()
    }

    fn backend(&self, alias: &str) -> EngineResult<(&DatabaseAlias, &dyn Backend)> {
        self.backends
            .get_key_value(alias)
            .map(|(alias, backend)| (alias, backend.as_ref()))
            .ok_or_else(|| EngineError::UnknownDatabase {
                alias: alias.to_string(),
            })
    }

    /// Every ledger entry of `alias`, partial ones included.
    pub async fn ledger(&self, alias: &str) -> EngineResult<Vec<LedgerEntry>> {
        let (_, backend) = self.backend(alias)?;
        backend.ensure_ledger().await?;
        Ok(backend.ledger_entries().await?)
    }

    /// Migrations fully applied on `alias`.
    pub async fn status(&self, alias: &str) -> EngineResult<BTreeSet<MigrationKey>> {
        Ok(self
            .ledger(alias)
            .await?
            .into_iter()
            .filter(LedgerEntry::is_applied)
            .map(|e| e.migration)
            .collect())
    }

    /// Migrations a run towards `target` would execute on `alias`, in run order.
    pub async fn plan(
        &self,
        alias: &str,
        target: &Target,
        direction: Direction,
    ) -> EngineResult<Vec<MigrationKey>> {
        let (alias, _) = self.backend(alias)?;
        let applied = self.status(alias).await?;
        let keys = match direction {
            Direction::Forward => self
                .planner
                .plan_forward(target)?
                .into_iter()
                .filter(|k| !applied.contains(k))
                .collect::<Vec<_>>(),
            Direction::Backward => self.planner.plan_backward(&applied, target)?.steps,
        };

        let mut planned = Vec::with_capacity(keys.len());
        for key in keys {
            if self.routed_to(alias, &key)? {
                planned.push(key);
            }
        }
        Ok(planned)
    }

    /// Bring `alias` forward to `target`.
    pub async fn apply(
        &self,
        alias: &str,
        target: &Target,
        cancel: &CancelToken,
    ) -> EngineResult<ApplyReport> {
        let (alias, backend) = self.backend(alias)?;
        let plan = self.planner.plan_forward(target)?;
        self.check_history(alias).await?;
        log::info!(
            "Migrating '{}' to {} ({} migration(s) in plan)",
            alias,
            target,
            plan.len()
        );
        Applier::new(alias, backend, &self.planner, &self.routers)
            .with_cancel(cancel.clone())
            .apply(&plan)
            .await
    }

    /// Take `alias` back to `target`.
    pub async fn unapply(
        &self,
        alias: &str,
        target: &Target,
        cancel: &CancelToken,
    ) -> EngineResult<ApplyReport> {
        let (alias, backend) = self.backend(alias)?;
        let applied = self.status(alias).await?;
        let plan = self.planner.plan_backward(&applied, target)?;
        log::info!(
            "Rolling back '{}' to {} ({} migration(s) in plan)",
            alias,
            target,
            plan.steps.len()
        );
        Applier::new(alias, backend, &self.planner, &self.routers)
            .with_cancel(cancel.clone())
            .unapply(&plan)
            .await
    }

    /// Apply on every alias. The runs are polled together on the calling
    /// task; DuckDB calls block, so in practice the aliases migrate one
    /// after another. A failure on one alias leaves the others running.
    pub async fn apply_all(
        &self,
        target: &Target,
        cancel: &CancelToken,
    ) -> Vec<(DatabaseAlias, EngineResult<ApplyReport>)> {
        join_all(self.backends.keys().map(|alias| async move {
            let result = self.apply(alias, target, cancel).await;
            if let Err(e) = &result {
                log::error!("Migrating '{}' failed: {}", alias, e);
            }
            (alias.clone(), result)
        }))
        .await
    }

    /// Correct the ledger by hand, typically after a partial application.
    pub async fn resolve(
        &self,
        alias: &str,
        key: &MigrationKey,
        resolution: Resolution,
    ) -> EngineResult<()> {
        let (alias, backend) = self.backend(alias)?;
        self.planner.migration(key)?;
        backend.ensure_ledger().await?;
        match resolution {
            Resolution::MarkApplied => {
                backend.record_applied(key).await?;
                log::info!("Marked {} as applied on '{}'", key, alias);
            }
            Resolution::MarkPending => {
                backend.erase(key).await?;
                log::info!("Marked {} as pending on '{}'", key, alias);
            }
        }
        Ok(())
    }

    /// Virtual schema after applying everything up to `target`.
    ///
    /// `Zero(ns)` projects every migration except those of `ns` and their
    /// dependents.
    pub fn project_state(&self, target: &Target) -> EngineResult<ProjectState> {
        let keys = match target {
            Target::Zero(namespace) => {
                let mut excluded = BTreeSet::new();
                for key in self.planner.graph().keys() {
                    if key.namespace == *namespace {
                        excluded.extend(self.planner.graph().descendants(&key)?);
                        excluded.insert(key);
                    }
                }
                self.planner
                    .graph()
                    .forward_order()
                    .into_iter()
                    .filter(|k| !excluded.contains(k))
                    .collect()
            }
            _ => self.planner.plan_forward(target)?,
        };

        let migrations = keys
            .iter()
            .map(|k| self.planner.migration(k))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projector::project(migrations)?)
    }

    fn routed_to(&self, alias: &DatabaseAlias, key: &MigrationKey) -> EngineResult<bool> {
        let migration = self.planner.migration(key)?;
        Ok(self.routers.allow(&RouteRequest {
            database: alias,
            namespace: migration.namespace(),
            entity: None,
            hints: &migration.hints,
        }))
    }

    /// Every dependency of a migration applied on `alias` must be applied on
    /// some database, or be routed away from `alias`.
    async fn check_history(&self, alias: &DatabaseAlias) -> EngineResult<()> {
        let applied = self.status(alias).await?;
        if applied.is_empty() {
            return Ok(());
        }

        let mut elsewhere = BTreeSet::new();
        for other in self.backends.keys().filter(|a| *a != alias) {
            elsewhere.extend(self.status(other).await?);
        }

        for key in &applied {
            let Ok(dependencies) = self.planner.graph().dependencies(key) else {
                continue;
            };
            for dependency in dependencies {
                if applied.contains(&dependency)
                    || elsewhere.contains(&dependency)
                    || !self.routed_to(alias, &dependency)?
                {
                    continue;
                }
                return Err(EngineError::InconsistentHistory {
                    alias: alias.clone(),
                    migration: key.clone(),
                    dependency,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
