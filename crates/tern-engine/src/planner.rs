//! Dependency Graph & Planner.
//!
//! The planner owns the full migration set and the graph built from it. Both
//! are rebuilt for every engine invocation and never mutated afterwards.

use crate::error::{EngineError, EngineResult};
use crate::migration::Migration;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tern_core::{CoreError, CoreResult, MigrationGraph, MigrationKey, Target};

/// Which way a plan moves the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
        }
    }
}

/// Migrations to unapply, plus what is needed to rebuild their states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackwardPlan {
    /// Migrations to reverse, in reversal order
    pub steps: Vec<MigrationKey>,

    /// Forward order of the steps and all their dependencies; folding it
    /// reproduces the state each step was originally applied to
    pub context: Vec<MigrationKey>,
}

impl BackwardPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Validated migration set with its dependency graph.
#[derive(Debug)]
pub struct Planner {
    migrations: BTreeMap<MigrationKey, Migration>,
    graph: MigrationGraph,
}

impl Planner {
    /// Build and validate the graph for `migrations`.
    pub fn build(migrations: Vec<Migration>) -> CoreResult<Self> {
        let graph =
            MigrationGraph::build(migrations.iter().map(|m| (&m.key, &m.dependencies)))?;
        let migrations = migrations.into_iter().map(|m| (m.key.clone(), m)).collect();
        Ok(Self { migrations, graph })
    }

    pub fn graph(&self) -> &MigrationGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn migration(&self, key: &MigrationKey) -> CoreResult<&Migration> {
        self.migrations
            .get(key)
            .ok_or_else(|| CoreError::MigrationNotFound {
                key: key.to_string(),
            })
    }

    /// Migrations sorted by key.
    pub fn migrations(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.values()
    }

    /// Migrations needed to reach `target`, dependencies first.
    ///
    /// The plan is not filtered by any ledger: already-applied migrations
    /// stay in it so their state effects can be replayed.
    pub fn plan_forward(&self, target: &Target) -> CoreResult<Vec<MigrationKey>> {
        match target {
            Target::Latest => Ok(self.graph.forward_order()),
            Target::Migration(key) => self.graph.forward_order_to(key),
            Target::Zero(_) => Ok(Vec::new()),
        }
    }

    /// Applied migrations to reverse to reach `target`.
    ///
    /// - `Latest` reverses every applied migration.
    /// - `Migration(t)` reverses the applied migrations depending on `t`,
    ///   keeping `t` itself.
    /// - `Zero(ns)` reverses the applied migrations of `ns` and every applied
    ///   migration depending on them.
    ///
    /// Fails with [`EngineError::Irreversible`] before anything runs if a
    /// step contains an operation without backward behavior.
    pub fn plan_backward(
        &self,
        applied: &BTreeSet<MigrationKey>,
        target: &Target,
    ) -> EngineResult<BackwardPlan> {
        let known: BTreeSet<&MigrationKey> = applied
            .iter()
            .filter(|key| {
                let found = self.graph.contains(key);
                if !found {
                    log::warn!("Ledger lists unknown migration '{}', ignoring it", key);
                }
                found
            })
            .collect();

        let selected: BTreeSet<MigrationKey> = match target {
            Target::Latest => known.into_iter().cloned().collect(),
            Target::Migration(key) => self
                .graph
                .descendants(key)?
                .into_iter()
                .filter(|k| known.contains(k))
                .collect(),
            Target::Zero(namespace) => {
                let mut keys = BTreeSet::new();
                for key in known.iter().filter(|k| k.namespace == *namespace) {
                    keys.insert((*key).clone());
                    keys.extend(
                        self.graph
                            .descendants(key)?
                            .into_iter()
                            .filter(|k| known.contains(k)),
                    );
                }
                keys
            }
        };

        let mut steps = self.graph.order(&selected);
        steps.reverse();

        for key in &steps {
            let migration = self.migration(key)?;
            if let Some((operation, op)) = migration.first_irreversible() {
                return Err(EngineError::Irreversible {
                    migration: key.clone(),
                    operation,
                    description: op.description(),
                });
            }
        }

        let mut context_keys = selected.clone();
        for key in &selected {
            context_keys.extend(self.graph.ancestors(key)?);
        }
        let context = self.graph.order(&context_keys);

        log::debug!(
            "Backward plan to {}: {} step(s), {} context migration(s)",
            target,
            steps.len(),
            context.len()
        );
        Ok(BackwardPlan { steps, context })
    }
}

#[cfg(test)]
#[path = "planner_test.rs"]
mod tests;
