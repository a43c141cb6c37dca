//! Migration dependency graph and deterministic ordering

use crate::error::{CoreError, CoreResult};
use crate::key::MigrationKey;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A directed acyclic graph of migration dependencies.
///
/// Edges point from a dependency to its dependent, so walking outgoing edges
/// visits migrations that must run later. The graph is rebuilt for every
/// planning request and is immutable once built, which makes it safe to share
/// across concurrent appliers.
#[derive(Debug)]
pub struct MigrationGraph {
    /// The underlying graph
    graph: DiGraph<MigrationKey, ()>,

    /// Map from migration key to node index
    node_map: HashMap<MigrationKey, NodeIndex>,

    /// Longest dependency chain below each node
    depth: HashMap<NodeIndex, usize>,
}

impl MigrationGraph {
    /// Build the graph from `(migration, dependencies)` pairs.
    ///
    /// Fails with [`CoreError::DuplicateMigration`] for repeated keys,
    /// [`CoreError::UnknownDependency`] for dependencies outside the input
    /// and [`CoreError::CircularDependency`] if the result has a cycle.
    pub fn build<'a, I>(nodes: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = (&'a MigrationKey, &'a BTreeSet<MigrationKey>)>,
    {
        let nodes: Vec<_> = nodes.into_iter().collect();
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for (key, _) in &nodes {
            if node_map.contains_key(*key) {
                return Err(CoreError::DuplicateMigration {
                    key: (*key).clone(),
                });
            }
            let idx = graph.add_node((*key).clone());
            node_map.insert((*key).clone(), idx);
        }

        for (key, deps) in &nodes {
            let to = node_map[*key];
            for dep in deps.iter() {
                let Some(&from) = node_map.get(dep) else {
                    return Err(CoreError::UnknownDependency {
                        migration: (*key).clone(),
                        dependency: dep.clone(),
                    });
                };
                graph.add_edge(from, to, ());
            }
        }

        let mut dag = Self {
            graph,
            node_map,
            depth: HashMap::new(),
        };
        dag.validate()?;
        dag.depth = dag.compute_depths();
        Ok(dag)
    }

    /// Validate the graph has no cycles.
    ///
    /// Runs a depth-first search in key order, tracking the in-progress path;
    /// the first back edge found yields the cycle reported in the error.
    pub fn validate(&self) -> CoreResult<()> {
        let mut done = HashSet::new();
        let mut path = Vec::new();
        let mut on_path = HashSet::new();

        for idx in self.sorted_indices() {
            if done.contains(&idx) {
                continue;
            }
            if let Some(cycle) = self.find_cycle(idx, &mut path, &mut on_path, &mut done) {
                return Err(CoreError::CircularDependency { cycle });
            }
        }
        Ok(())
    }

    fn find_cycle(
        &self,
        idx: NodeIndex,
        path: &mut Vec<NodeIndex>,
        on_path: &mut HashSet<NodeIndex>,
        done: &mut HashSet<NodeIndex>,
    ) -> Option<Vec<MigrationKey>> {
        path.push(idx);
        on_path.insert(idx);

        let mut next: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.target())
            .collect();
        next.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));

        for target in next {
            if on_path.contains(&target) {
                let start = path.iter().position(|n| *n == target).unwrap_or(0);
                return Some(
                    path[start..]
                        .iter()
                        .map(|n| self.graph[*n].clone())
                        .collect(),
                );
            }
            if done.contains(&target) {
                continue;
            }
            if let Some(cycle) = self.find_cycle(target, path, on_path, done) {
                return Some(cycle);
            }
        }

        path.pop();
        on_path.remove(&idx);
        done.insert(idx);
        None
    }

    fn compute_depths(&self) -> HashMap<NodeIndex, usize> {
        let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
        // acyclic at this point, so toposort cannot fail
        let order = petgraph::algo::toposort(&self.graph, None).unwrap_or_default();
        for idx in order {
            let d = self
                .graph
                .edges_directed(idx, Direction::Incoming)
                .map(|e| depth.get(&e.source()).copied().unwrap_or(0) + 1)
                .max()
                .unwrap_or(0);
            depth.insert(idx, d);
        }
        depth
    }

    fn sorted_indices(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        indices.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        indices
    }

    fn index(&self, key: &MigrationKey) -> CoreResult<NodeIndex> {
        self.node_map
            .get(key)
            .copied()
            .ok_or_else(|| CoreError::MigrationNotFound {
                key: key.to_string(),
            })
    }

    /// Number of migrations in the graph
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Check if a migration exists in the graph
    pub fn contains(&self, key: &MigrationKey) -> bool {
        self.node_map.contains_key(key)
    }

    /// Length of the longest dependency chain below `key`
    pub fn depth(&self, key: &MigrationKey) -> Option<usize> {
        self.node_map
            .get(key)
            .and_then(|idx| self.depth.get(idx))
            .copied()
    }

    /// Order `keys` so dependencies come first.
    ///
    /// Sorts by `(depth, namespace, name)`: every dependency has a strictly
    /// smaller depth than its dependents, and equal-depth migrations fall back
    /// to key order so repeated calls over the same graph agree.
    pub fn order<'a, I>(&self, keys: I) -> Vec<MigrationKey>
    where
        I: IntoIterator<Item = &'a MigrationKey>,
    {
        let mut keyed: Vec<(usize, &MigrationKey)> = keys
            .into_iter()
            .filter_map(|k| self.depth(k).map(|d| (d, k)))
            .collect();
        keyed.sort();
        keyed.dedup();
        keyed.into_iter().map(|(_, k)| k.clone()).collect()
    }

    /// Every migration in forward order.
    pub fn forward_order(&self) -> Vec<MigrationKey> {
        self.order(self.node_map.keys())
    }

    /// `target` and its transitive dependencies in forward order.
    pub fn forward_order_to(&self, target: &MigrationKey) -> CoreResult<Vec<MigrationKey>> {
        let mut keys = self.ancestors(target)?;
        keys.insert(target.clone());
        Ok(self.order(&keys))
    }

    /// Direct dependencies of a migration
    pub fn dependencies(&self, key: &MigrationKey) -> CoreResult<BTreeSet<MigrationKey>> {
        self.neighbors(key, Direction::Incoming)
    }

    /// Direct dependents of a migration
    pub fn dependents(&self, key: &MigrationKey) -> CoreResult<BTreeSet<MigrationKey>> {
        self.neighbors(key, Direction::Outgoing)
    }

    fn neighbors(
        &self,
        key: &MigrationKey,
        direction: Direction,
    ) -> CoreResult<BTreeSet<MigrationKey>> {
        let idx = self.index(key)?;
        Ok(self
            .graph
            .edges_directed(idx, direction)
            .map(|e| match direction {
                Direction::Incoming => self.graph[e.source()].clone(),
                Direction::Outgoing => self.graph[e.target()].clone(),
            })
            .collect())
    }

    /// All transitive dependencies of a migration
    pub fn ancestors(&self, key: &MigrationKey) -> CoreResult<BTreeSet<MigrationKey>> {
        let idx = self.index(key)?;
        Ok(self.collect_reachable(idx, Direction::Incoming))
    }

    /// All transitive dependents of a migration
    pub fn descendants(&self, key: &MigrationKey) -> CoreResult<BTreeSet<MigrationKey>> {
        let idx = self.index(key)?;
        Ok(self.collect_reachable(idx, Direction::Outgoing))
    }

    /// Collect all nodes reachable from `start` by following edges in `direction`.
    fn collect_reachable(&self, start: NodeIndex, direction: Direction) -> BTreeSet<MigrationKey> {
        let mut result = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![start];

        while let Some(current) = stack.pop() {
            for edge in self.graph.edges_directed(current, direction) {
                let neighbor = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                if visited.insert(neighbor) {
                    result.insert(self.graph[neighbor].clone());
                    stack.push(neighbor);
                }
            }
        }

        result
    }

    /// Migrations of `namespace` that no other migration of the same
    /// namespace depends on.
    pub fn leaf_nodes(&self, namespace: &str) -> Vec<MigrationKey> {
        let mut leaves: Vec<MigrationKey> = self
            .graph
            .node_indices()
            .filter(|idx| self.graph[*idx].namespace == namespace)
            .filter(|idx| {
                !self
                    .graph
                    .edges_directed(*idx, Direction::Outgoing)
                    .any(|e| self.graph[e.target()].namespace == namespace)
            })
            .map(|idx| self.graph[idx].clone())
            .collect();
        leaves.sort();
        leaves
    }

    /// Migrations without dependencies.
    pub fn root_nodes(&self) -> Vec<MigrationKey> {
        let mut roots: Vec<MigrationKey> = self
            .graph
            .node_indices()
            .filter(|idx| {
                self.graph
                    .edges_directed(*idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.graph[idx].clone())
            .collect();
        roots.sort();
        roots
    }

    /// Every migration key, sorted.
    pub fn keys(&self) -> Vec<MigrationKey> {
        let mut keys: Vec<MigrationKey> = self.node_map.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
