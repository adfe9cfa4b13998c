// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use crate::config::model::ConfigFile;
use crate::types::BuildUnit;

/// Read-only view of the module dependency graph consumed by the scheduler.
///
/// Implementations must be consistent (if A is upstream of B then B is
/// downstream of A) and acyclic. The scheduler assumes both and never
/// mutates the graph.
pub trait DependencyGraph: Send + Sync {
    /// Whether the graph knows this unit at all.
    fn contains(&self, unit: &BuildUnit) -> bool;

    /// Direct prerequisites of `unit`.
    fn upstream(&self, unit: &BuildUnit) -> &[BuildUnit];

    /// Direct dependents of `unit`.
    fn downstream(&self, unit: &BuildUnit) -> &[BuildUnit];
}

/// Internal node structure: stores immediate upstream and downstream units.
#[derive(Debug, Clone, Default)]
struct DagNode {
    upstream: Vec<BuildUnit>,
    downstream: Vec<BuildUnit>,
}

/// Simple in-memory DAG keyed by unit.
///
/// Acyclicity is validated by `config::validate` for graphs built from a
/// reactor file; graphs assembled through [`DagGraphBuilder`] are taken as
/// given.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    /// Units in declaration order.
    order: Vec<BuildUnit>,
    nodes: HashMap<BuildUnit, DagNode>,
}

impl DagGraph {
    /// Build a DAG from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut builder = DagGraph::builder();
        for name in cfg.module.keys() {
            builder = builder.unit(name.as_str());
        }
        for (name, module) in cfg.module.iter() {
            for dep in module.after.iter() {
                builder = builder.edge(dep.as_str(), name.as_str());
            }
        }
        builder.build()
    }

    pub fn builder() -> DagGraphBuilder {
        DagGraphBuilder::default()
    }

    /// All units, in declaration order.
    pub fn units(&self) -> impl Iterator<Item = &BuildUnit> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl DependencyGraph for DagGraph {
    fn contains(&self, unit: &BuildUnit) -> bool {
        self.nodes.contains_key(unit)
    }

    fn upstream(&self, unit: &BuildUnit) -> &[BuildUnit] {
        self.nodes
            .get(unit)
            .map(|n| n.upstream.as_slice())
            .unwrap_or(&[])
    }

    fn downstream(&self, unit: &BuildUnit) -> &[BuildUnit] {
        self.nodes
            .get(unit)
            .map(|n| n.downstream.as_slice())
            .unwrap_or(&[])
    }
}

/// Incremental construction of a [`DagGraph`].
///
/// `edge(from, to)` means `from` must be built before `to`; both ends are
/// added as units if they are not yet known. Duplicate edges are ignored.
#[derive(Debug, Default)]
pub struct DagGraphBuilder {
    graph: DagGraph,
}

impl DagGraphBuilder {
    pub fn unit(mut self, unit: impl Into<BuildUnit>) -> Self {
        self.ensure(unit.into());
        self
    }

    pub fn edge(mut self, from: impl Into<BuildUnit>, to: impl Into<BuildUnit>) -> Self {
        let from = from.into();
        let to = to.into();
        self.ensure(from.clone());
        self.ensure(to.clone());

        let duplicate = self
            .graph
            .nodes
            .get(&to)
            .is_some_and(|n| n.upstream.contains(&from));
        if duplicate {
            return self;
        }

        if let Some(node) = self.graph.nodes.get_mut(&to) {
            node.upstream.push(from.clone());
        }
        if let Some(node) = self.graph.nodes.get_mut(&from) {
            node.downstream.push(to);
        }
        self
    }

    pub fn build(self) -> DagGraph {
        self.graph
    }

    fn ensure(&mut self, unit: BuildUnit) {
        if !self.graph.nodes.contains_key(&unit) {
            self.graph.order.push(unit.clone());
            self.graph.nodes.insert(unit, DagNode::default());
        }
    }
}

/// Every unit reachable downstream of `root` (excluding `root`), found with
/// a depth-first walk.
pub fn downstream_closure<G>(graph: &G, root: &BuildUnit) -> Vec<BuildUnit>
where
    G: DependencyGraph + ?Sized,
{
    let mut stack: Vec<BuildUnit> = graph.downstream(root).to_vec();
    let mut visited: HashSet<BuildUnit> = HashSet::new();
    let mut reached = Vec::new();

    while let Some(unit) = stack.pop() {
        if !visited.insert(unit.clone()) {
            continue;
        }
        stack.extend(graph.downstream(&unit).iter().cloned());
        reached.push(unit);
    }

    reached
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(name: &str) -> BuildUnit {
        BuildUnit::from(name)
    }

    #[test]
    fn builder_keeps_upstream_and_downstream_consistent() {
        let graph = DagGraph::builder()
            .edge("A", "B")
            .edge("A", "C")
            .edge("B", "D")
            .edge("C", "D")
            .edge("C", "D")
            .build();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.upstream(&u("D")), &[u("B"), u("C")]);
        assert_eq!(graph.downstream(&u("A")), &[u("B"), u("C")]);
        assert!(graph.upstream(&u("A")).is_empty());
        assert!(!graph.contains(&u("Z")));
    }

    #[test]
    fn downstream_closure_is_transitive_and_excludes_root() {
        let graph = DagGraph::builder()
            .edge("A", "B")
            .edge("B", "C")
            .unit("X")
            .build();

        let mut reached = downstream_closure(&graph, &u("A"));
        reached.sort();
        assert_eq!(reached, vec![u("B"), u("C")]);
        assert!(downstream_closure(&graph, &u("X")).is_empty());
    }
}
