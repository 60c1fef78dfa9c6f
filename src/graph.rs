//! Field dependency graph
//!
//! One node per (type, field) pair; a directed edge runs from a derived
//! field to every field it reads through its source chains or parent list.
//! Built once after all types are registered, validated for cycles before
//! any database is constructed, and consulted at runtime only through
//! [`DependencyGraph::dependents_of`] when a stored write invalidates
//! downstream caches.
//!
//! `SelfParent` fields read the instance table rather than other fields,
//! so they appear as nodes but contribute no edges.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};

use crate::error::{SchemaError, SchemaResult};
use crate::registry::{DataCore, TypeRegistry};

/// Identity of a field in the graph: declaring type plus field name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub type_name: String,
    pub field: String,
}

impl NodeId {
    pub fn new(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field: field.into(),
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field)
    }
}

/// Dependency graph over derived fields
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// node -> the fields it reads
    edges: IndexMap<NodeId, IndexSet<NodeId>>,
    /// node -> the fields that read it
    reverse: IndexMap<NodeId, IndexSet<NodeId>>,
}

impl DependencyGraph {
    /// Build from every derived field's declared sources. The registry must
    /// already have passed [`TypeRegistry::validate`]; binding failures here
    /// surface as `InvalidChain` rather than panicking.
    pub fn build(registry: &TypeRegistry) -> SchemaResult<DependencyGraph> {
        let mut graph = DependencyGraph::default();

        for ty in registry.types() {
            for field in &ty.fields {
                let node = NodeId::new(&ty.name, &field.name);
                let deps = match &field.data_core {
                    Some(DataCore::DirectDerived { chain, .. }) => {
                        chain_dependencies(registry, &node, std::slice::from_ref(chain))?
                    }
                    Some(DataCore::Derived { sources }) => {
                        chain_dependencies(registry, &node, sources)?
                    }
                    Some(DataCore::MultiParentList { parents }) => parents
                        .iter()
                        .map(|parent| {
                            let (declaring, _) = registry
                                .field(&ty.name, parent)
                                .ok_or_else(|| SchemaError::InvalidChain {
                                    type_name: ty.name.clone(),
                                    field: field.name.clone(),
                                    message: format!("parent field '{parent}' is not declared"),
                                })?;
                            Ok(NodeId::new(&declaring.name, parent))
                        })
                        .collect::<SchemaResult<Vec<_>>>()?,
                    Some(DataCore::SelfParent { .. }) => Vec::new(),
                    Some(DataCore::Static(_))
                    | Some(DataCore::InstanceStatic { .. })
                    | None => continue,
                };
                graph.add_node(node, deps);
            }
        }

        Ok(graph)
    }

    /// Construct directly from (dependent, dependency) pairs. Host
    /// collaborators that parse richer source expressions can feed the
    /// resulting pairs in through this constructor.
    pub fn from_edges(pairs: impl IntoIterator<Item = (NodeId, NodeId)>) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for (dependent, dependency) in pairs {
            graph.add_edge(dependent, dependency);
        }
        graph
    }

    fn add_node(&mut self, node: NodeId, deps: Vec<NodeId>) {
        self.edges.entry(node.clone()).or_default();
        for dep in deps {
            self.add_edge(node.clone(), dep);
        }
    }

    fn add_edge(&mut self, dependent: NodeId, dependency: NodeId) {
        self.reverse
            .entry(dependency.clone())
            .or_default()
            .insert(dependent.clone());
        self.edges.entry(dependency.clone()).or_default();
        self.edges.entry(dependent).or_default().insert(dependency);
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn dependencies_of(&self, node: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.edges.get(node).into_iter().flatten()
    }

    /// Every field transitively affected by a write to `node`, in
    /// deterministic breadth-first order, excluding `node` itself.
    pub fn dependents_of(&self, node: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen: HashSet<&NodeId> = HashSet::new();
        let mut frontier = vec![node];
        while let Some(current) = frontier.pop() {
            if let Some(dependents) = self.reverse.get(current) {
                for dep in dependents {
                    if seen.insert(dep) {
                        out.push(dep.clone());
                        frontier.push(dep);
                    }
                }
            }
        }
        out
    }

    /// Depth-first cycle detection. A cycle is fatal at startup; the error
    /// names the full path, first node repeated at the end.
    pub fn validate(&self) -> SchemaResult<()> {
        let mut finished: HashSet<&NodeId> = HashSet::new();
        let mut in_progress: Vec<&NodeId> = Vec::new();

        for start in self.edges.keys() {
            if !finished.contains(start) {
                self.dfs(start, &mut in_progress, &mut finished)?;
            }
        }
        Ok(())
    }

    fn dfs<'a>(
        &'a self,
        node: &'a NodeId,
        in_progress: &mut Vec<&'a NodeId>,
        finished: &mut HashSet<&'a NodeId>,
    ) -> SchemaResult<()> {
        if let Some(pos) = in_progress.iter().position(|n| *n == node) {
            let mut path: Vec<String> =
                in_progress[pos..].iter().map(|n| n.to_string()).collect();
            path.push(node.to_string());
            return Err(SchemaError::CyclicDependency { path });
        }

        in_progress.push(node);
        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if !finished.contains(dep) {
                    self.dfs(dep, in_progress, finished)?;
                }
            }
        }
        in_progress.pop();
        finished.insert(node);
        Ok(())
    }

    /// Deterministic evaluation order with every dependency ahead of its
    /// dependents. Used only as an eager warm-up hint; lazy evaluation is
    /// the runtime policy.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut in_degree: IndexMap<&NodeId, usize> = self
            .edges
            .iter()
            .map(|(node, deps)| (node, deps.len()))
            .collect();

        let mut frontier: Vec<&NodeId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        frontier.sort();

        let mut out = Vec::with_capacity(self.edges.len());
        while let Some(node) = frontier.pop() {
            out.push(node.clone());
            let mut released = Vec::new();
            if let Some(dependents) = self.reverse.get(node) {
                for dep in dependents {
                    let degree = in_degree.get_mut(dep).expect("dependent is a node");
                    *degree -= 1;
                    if *degree == 0 {
                        released.push(dep);
                    }
                }
            }
            released.sort();
            // Keep the frontier sorted so ties break the same way every run
            for dep in released.into_iter().rev() {
                frontier.insert(0, dep);
            }
        }

        out
    }
}

fn chain_dependencies(
    registry: &TypeRegistry,
    node: &NodeId,
    chains: &[crate::chain::SourceChain],
) -> SchemaResult<Vec<NodeId>> {
    let mut deps = Vec::new();
    for chain in chains {
        let hops = chain.hops(registry).map_err(|message| SchemaError::InvalidChain {
            type_name: node.type_name.clone(),
            field: node.field.clone(),
            message,
        })?;
        for hop in hops {
            let (declaring, _) = registry.field(&hop.owner, &hop.field).ok_or_else(|| {
                SchemaError::InvalidChain {
                    type_name: node.type_name.clone(),
                    field: node.field.clone(),
                    message: format!("'{}' has no field '{}'", hop.owner, hop.field),
                }
            })?;
            deps.push(NodeId::new(&declaring.name, &hop.field));
        }
    }
    Ok(deps)
}
