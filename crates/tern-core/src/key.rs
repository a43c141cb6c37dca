//! Migration keys and planning targets.

use crate::error::{CoreError, CoreResult};
use crate::names::{MigrationName, Namespace};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Stable address of a migration: `namespace.name`.
///
/// Ordering is namespace first, then name, both lexicographic. The planner
/// relies on this ordering as its tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MigrationKey {
    pub namespace: Namespace,
    pub name: MigrationName,
}

impl MigrationKey {
    /// Create a key, panicking if either part is empty.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Namespace::new(namespace),
            name: MigrationName::new(name),
        }
    }

    /// Parse `namespace.name`.
    pub fn parse(value: &str) -> CoreResult<Self> {
        Self::parse_in(value, None)
    }

    /// Parse `namespace.name`, or a bare `name` resolved against `default_namespace`.
    pub fn parse_in(value: &str, default_namespace: Option<&Namespace>) -> CoreResult<Self> {
        let invalid = |reason: &str| CoreError::InvalidMigrationKey {
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let (namespace, name) = match value.split_once('.') {
            Some((ns, name)) => (
                Namespace::try_new(ns).ok_or_else(|| invalid("namespace is empty"))?,
                name,
            ),
            None => match default_namespace {
                Some(ns) => (ns.clone(), value),
                None => return Err(invalid("expected 'namespace.name'")),
            },
        };
        let name = MigrationName::try_new(name).ok_or_else(|| invalid("name is empty"))?;
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl FromStr for MigrationKey {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MigrationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MigrationKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Where a plan should end.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    /// Every known migration (forward) or every applied migration (backward).
    #[default]
    Latest,
    /// A specific migration.
    Migration(MigrationKey),
    /// Before the first migration of a namespace.
    Zero(Namespace),
}

impl Target {
    /// The migration this target names, if any.
    pub fn migration(&self) -> Option<&MigrationKey> {
        match self {
            Target::Migration(key) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Latest => f.write_str("latest"),
            Target::Migration(key) => write!(f, "{key}"),
            Target::Zero(ns) => write!(f, "{ns}.zero"),
        }
    }
}

impl FromStr for Target {
    type Err = CoreError;

    /// Parse `latest`, `namespace.zero` or `namespace.name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "latest" {
            return Ok(Target::Latest);
        }
        let key = MigrationKey::parse(s)?;
        if key.name == "zero" {
            Ok(Target::Zero(key.namespace))
        } else {
            Ok(Target::Migration(key))
        }
    }
}
