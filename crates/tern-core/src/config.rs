//! Configuration types and parsing for tern.yml

use crate::error::{CoreError, CoreResult};
use crate::names::{DatabaseAlias, Namespace};
use crate::router::{HintRouter, NamespaceRouter, Router, RouterChain};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

const DEFAULT_DB_PATH: &str = ":memory:";
const DEFAULT_ALIAS: &str = "default";

/// Main project configuration from tern.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Directories containing `<namespace>/<migration>.yml` files
    #[serde(default = "default_migration_paths")]
    pub migration_paths: Vec<String>,

    /// Name of the ledger table created in every database
    #[serde(default = "default_ledger_table")]
    pub ledger_table: String,

    /// Alias used when a command does not name one
    #[serde(default)]
    pub default_database: Option<DatabaseAlias>,

    /// Physical databases keyed by alias
    #[serde(default = "default_databases")]
    pub databases: BTreeMap<DatabaseAlias, DatabaseConfig>,

    /// Routing policies
    #[serde(default)]
    pub routers: Vec<RouterConfig>,
}

/// Connection settings for one database alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// DuckDB file path, or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Wrap each migration in a DDL transaction
    #[serde(default = "default_true")]
    pub transactional: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            transactional: true,
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path == DEFAULT_DB_PATH
    }

    /// Database path resolved against the project root.
    pub fn path_absolute(&self, root: &Path) -> PathBuf {
        let path = Path::new(&self.path);
        if self.is_in_memory() || path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}

/// A configured router
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouterConfig {
    /// Route on a migration or operation hint
    Hint {
        name: String,
        priority: i32,
        key: String,
        /// Hint values that stand for several aliases
        #[serde(default)]
        groups: BTreeMap<String, Vec<DatabaseAlias>>,
    },

    /// Pin namespaces to aliases
    Namespace {
        name: String,
        priority: i32,
        routes: BTreeMap<Namespace, Vec<DatabaseAlias>>,
    },
}

impl RouterConfig {
    pub fn name(&self) -> &str {
        match self {
            RouterConfig::Hint { name, .. } | RouterConfig::Namespace { name, .. } => name,
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            RouterConfig::Hint { priority, .. } | RouterConfig::Namespace { priority, .. } => {
                *priority
            }
        }
    }

    /// Every alias this router mentions.
    fn aliases(&self) -> impl Iterator<Item = &DatabaseAlias> {
        let lists: Vec<&Vec<DatabaseAlias>> = match self {
            RouterConfig::Hint { groups, .. } => groups.values().collect(),
            RouterConfig::Namespace { routes, .. } => routes.values().collect(),
        };
        lists.into_iter().flatten()
    }

    pub fn build(&self) -> Box<dyn Router> {
        match self {
            RouterConfig::Hint {
                name, key, groups, ..
            } => {
                let router = groups
                    .iter()
                    .fold(HintRouter::new(name, key), |router, (group, aliases)| {
                        router.with_group(group, aliases.clone())
                    });
                Box::new(router)
            }
            RouterConfig::Namespace { name, routes, .. } => {
                let router = routes
                    .iter()
                    .fold(NamespaceRouter::new(name), |router, (ns, aliases)| {
                        router.route(ns.clone(), aliases.clone())
                    });
                Box::new(router)
            }
        }
    }
}

fn default_migration_paths() -> Vec<String> {
    vec!["migrations".to_string()]
}

fn default_ledger_table() -> String {
    "tern_ledger".to_string()
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_databases() -> BTreeMap<DatabaseAlias, DatabaseConfig> {
    BTreeMap::from([(DatabaseAlias::new(DEFAULT_ALIAS), DatabaseConfig::default())])
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for tern.yml or tern.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("tern.yml");
        let yaml_path = dir.join("tern.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "Project name cannot be empty".to_string(),
            });
        }

        if self.migration_paths.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "At least one migration_paths entry must be specified".to_string(),
            });
        }

        if self.ledger_table.is_empty()
            || !self
                .ledger_table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "ledger_table '{}' must contain only letters, digits and underscores",
                    self.ledger_table
                ),
            });
        }

        if self.databases.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "At least one database must be configured".to_string(),
            });
        }

        if let Some(alias) = &self.default_database {
            if !self.databases.contains_key(alias) {
                return Err(CoreError::ConfigInvalid {
                    message: format!("default_database '{alias}' is not a configured database"),
                });
            }
        }

        let mut names = HashSet::new();
        for router in &self.routers {
            if !names.insert(router.name()) {
                return Err(CoreError::ConfigInvalid {
                    message: format!("Router name '{}' is used twice", router.name()),
                });
            }
            if let Some(alias) = router.aliases().find(|a| !self.databases.contains_key(*a)) {
                return Err(CoreError::ConfigInvalid {
                    message: format!(
                        "Router '{}' references unknown database '{alias}'",
                        router.name()
                    ),
                });
            }
        }

        self.router_chain().map(|_| ())
    }

    /// The alias used when none is given: `default_database`, else the first
    /// configured alias.
    pub fn default_alias(&self) -> DatabaseAlias {
        self.default_database
            .clone()
            .or_else(|| self.databases.keys().next().cloned())
            .unwrap_or_else(|| DatabaseAlias::new(DEFAULT_ALIAS))
    }

    /// Look up a database, failing with [`CoreError::ConfigInvalid`].
    pub fn database(&self, alias: &str) -> CoreResult<&DatabaseConfig> {
        self.databases
            .get(alias)
            .ok_or_else(|| CoreError::ConfigInvalid {
                message: format!("Database '{alias}' is not configured"),
            })
    }

    /// Configured aliases, sorted.
    pub fn aliases(&self) -> Vec<DatabaseAlias> {
        self.databases.keys().cloned().collect()
    }

    /// Get absolute migration paths
    pub fn migration_paths_absolute(&self, root: &Path) -> Vec<PathBuf> {
        self.migration_paths.iter().map(|p| root.join(p)).collect()
    }

    /// Build the ordered router chain.
    pub fn router_chain(&self) -> CoreResult<RouterChain> {
        RouterChain::from_routers(
            self.routers
                .iter()
                .map(|r| (r.priority(), r.build()))
                .collect(),
        )
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
