//! Migration: a named node of ordered operations plus dependencies.

use crate::operation::Operation;
use serde_json::Value;
use std::collections::BTreeSet;
use tern_core::{Hints, MigrationKey, Namespace};

#[derive(Debug, Clone)]
pub struct Migration {
    pub key: MigrationKey,

    /// Migrations that must be applied first; may cross namespaces
    pub dependencies: BTreeSet<MigrationKey>,

    /// Applied in declaration order
    pub operations: Vec<Operation>,

    /// First migration of its namespace
    pub initial: bool,

    /// Run inside a DDL transaction when the backend supports one
    pub atomic: bool,

    /// Defaults for every operation's hints
    pub hints: Hints,
}

impl Migration {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_key(MigrationKey::new(namespace, name))
    }

    pub fn with_key(key: MigrationKey) -> Self {
        Self {
            key,
            dependencies: BTreeSet::new(),
            operations: Vec::new(),
            initial: false,
            atomic: true,
            hints: Hints::new(),
        }
    }

    pub fn depends_on(mut self, key: MigrationKey) -> Self {
        self.dependencies.insert(key);
        self
    }

    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    pub fn atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    pub fn hint(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.hints.insert(key, value);
        self
    }

    pub fn operation(mut self, operation: impl Into<Operation>) -> Self {
        self.operations.push(operation.into());
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.key.namespace
    }

    /// The first operation without backward behavior, if any.
    pub fn first_irreversible(&self) -> Option<(usize, &Operation)> {
        self.operations
            .iter()
            .enumerate()
            .find(|(_, op)| !op.is_reversible())
    }

    pub fn is_reversible(&self) -> bool {
        self.first_irreversible().is_none()
    }

    /// Hints for one operation: migration hints overridden by the operation's.
    pub fn operation_hints(&self, operation: &Operation) -> Hints {
        self.hints.merged_with(&operation.hints)
    }
}
