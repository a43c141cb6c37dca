//! Routing policies deciding which database an operation runs against.
//!
//! A [`RouterChain`] holds routers ordered by descending priority. Each router
//! may return a verdict or abstain; the first verdict wins and an all-abstain
//! chain allows the operation.

use crate::error::{CoreError, CoreResult};
use crate::hints::Hints;
use crate::names::{DatabaseAlias, EntityName, Namespace};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// What a router is asked about.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    /// Database the applier is working on
    pub database: &'a DatabaseAlias,

    /// Namespace of the migration being applied
    pub namespace: &'a Namespace,

    /// Entity the operation touches, when it targets a single one
    pub entity: Option<&'a EntityName>,

    /// Migration hints, already merged with operation hints
    pub hints: &'a Hints,
}

/// A routing policy.
pub trait Router: Send + Sync + fmt::Debug {
    /// Name used in logs and conflict errors
    fn name(&self) -> &str;

    /// `Some(true)` to allow, `Some(false)` to skip, `None` to abstain.
    fn allow(&self, request: &RouteRequest<'_>) -> Option<bool>;
}

/// Routes on a hint value.
///
/// When the migration carries `key`, the hint value names either an alias
/// group from `groups` or a database alias directly; a list of such names is
/// also accepted. The operation runs only on the named databases.
#[derive(Debug, Clone)]
pub struct HintRouter {
    name: String,
    key: String,
    groups: BTreeMap<String, Vec<DatabaseAlias>>,
}

impl HintRouter {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            groups: BTreeMap::new(),
        }
    }

    /// Let hint value `group` stand for several aliases.
    pub fn with_group(mut self, group: impl Into<String>, aliases: Vec<DatabaseAlias>) -> Self {
        self.groups.insert(group.into(), aliases);
        self
    }

    fn matches(&self, value: &str, database: &DatabaseAlias) -> bool {
        match self.groups.get(value) {
            Some(aliases) => aliases.contains(database),
            None => database == value,
        }
    }
}

impl Router for HintRouter {
    fn name(&self) -> &str {
        &self.name
    }

    fn allow(&self, request: &RouteRequest<'_>) -> Option<bool> {
        match request.hints.get(&self.key)? {
            Value::String(value) => Some(self.matches(value, request.database)),
            Value::Array(values) => Some(
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|v| self.matches(v, request.database)),
            ),
            _ => None,
        }
    }
}

/// Pins whole namespaces to a set of databases.
#[derive(Debug, Clone)]
pub struct NamespaceRouter {
    name: String,
    routes: BTreeMap<Namespace, Vec<DatabaseAlias>>,
}

impl NamespaceRouter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: BTreeMap::new(),
        }
    }

    pub fn route(mut self, namespace: Namespace, aliases: Vec<DatabaseAlias>) -> Self {
        self.routes.insert(namespace, aliases);
        self
    }
}

impl Router for NamespaceRouter {
    fn name(&self) -> &str {
        &self.name
    }

    fn allow(&self, request: &RouteRequest<'_>) -> Option<bool> {
        self.routes
            .get(request.namespace)
            .map(|aliases| aliases.contains(request.database))
    }
}

/// Routers ordered by descending priority.
#[derive(Debug, Default)]
pub struct RouterChain {
    routers: Vec<(i32, Box<dyn Router>)>,
}

impl RouterChain {
    /// Empty chain: every operation is allowed everywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from `(priority, router)` pairs.
    ///
    /// Two routers with the same priority have no defined order, which is
    /// reported as [`CoreError::RouterConflict`].
    pub fn from_routers(routers: Vec<(i32, Box<dyn Router>)>) -> CoreResult<Self> {
        let mut chain = Self::new();
        for (priority, router) in routers {
            chain.push(priority, router)?;
        }
        Ok(chain)
    }

    /// Insert a router, keeping the chain sorted.
    pub fn push(&mut self, priority: i32, router: Box<dyn Router>) -> CoreResult<()> {
        if let Some((_, existing)) = self.routers.iter().find(|(p, _)| *p == priority) {
            return Err(CoreError::RouterConflict {
                first: existing.name().to_string(),
                second: router.name().to_string(),
                priority,
            });
        }
        let pos = self
            .routers
            .iter()
            .position(|(p, _)| *p < priority)
            .unwrap_or(self.routers.len());
        self.routers.insert(pos, (priority, router));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    /// Router names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.routers.iter().map(|(_, r)| r.name()).collect()
    }

    /// Evaluate the chain. The first router with a verdict decides.
    pub fn allow(&self, request: &RouteRequest<'_>) -> bool {
        for (priority, router) in &self.routers {
            if let Some(verdict) = router.allow(request) {
                log::debug!(
                    "Router '{}' (priority {}) {} {} on '{}'",
                    router.name(),
                    priority,
                    if verdict { "allows" } else { "skips" },
                    request.namespace,
                    request.database
                );
                return verdict;
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
