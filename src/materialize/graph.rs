/// Executable workflow graph
///
/// The materializer's output: a petgraph `DiGraph` whose nodes are bound to
/// resolved activity descriptors and whose edges are port-to-port connections.
/// Transient and owned by the caller; never persisted.

use crate::activity::ActivityDescriptor;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

/// A concrete value bound to a property
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Literal(Value),
    Expression { syntax: String, expression: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundProperty {
    pub name: String,
    pub value: BoundValue,
    /// True when the value came from the descriptor's default
    pub from_default: bool,
}

/// One node of the graph, bound to its activity descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityNode {
    pub id: String,
    pub descriptor: Arc<ActivityDescriptor>,
    /// Bound properties in descriptor order; unset properties are absent
    pub properties: Vec<BoundProperty>,
}

impl ActivityNode {
    pub fn kind(&self) -> &str {
        &self.descriptor.kind
    }

    pub fn property(&self, name: &str) -> Option<&BoundValue> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

/// Edge weight: which ports a connection joins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub source_port: String,
    pub target_port: String,
}

#[derive(Debug, Clone)]
pub struct ExecutableGraph {
    pub definition_id: String,
    pub definition_version: u32,
    graph: DiGraph<ActivityNode, Connection>,
    /// Key: node id
    node_index: HashMap<String, NodeIndex>,
}

impl ExecutableGraph {
    pub(crate) fn new(definition_id: String, definition_version: u32) -> Self {
        Self {
            definition_id,
            definition_version,
            graph: DiGraph::new(),
            node_index: HashMap::new(),
        }
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub(crate) fn add_node(&mut self, node: ActivityNode) {
        let id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_index.insert(id, index);
    }

    /// Caller guarantees both ids exist
    pub(crate) fn add_connection(&mut self, source: &str, target: &str, connection: Connection) {
        if let (Some(&from), Some(&to)) = (self.node_index.get(source), self.node_index.get(target)) {
            self.graph.add_edge(from, to, connection);
        }
    }

    pub fn node(&self, id: &str) -> Option<&ActivityNode> {
        self.node_index.get(id).map(|&i| &self.graph[i])
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &ActivityNode> {
        self.graph.node_indices().map(move |i| &self.graph[i])
    }

    /// (source id, target id, ports) in insertion order
    pub fn connections(&self) -> impl Iterator<Item = (&str, &str, &Connection)> {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].id.as_str(),
                self.graph[e.target()].id.as_str(),
                e.weight(),
            )
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Ids of nodes fed by `id`'s outputs
    pub fn successors(&self, id: &str) -> Vec<&str> {
        let Some(&index) = self.node_index.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<&str> = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .map(|n| self.graph[n].id.as_str())
            .collect();
        // petgraph yields neighbors newest-first
        ids.reverse();
        ids
    }

    /// Nodes without incoming connections, in insertion order
    pub fn roots(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .filter(|&i| {
                self.graph
                    .neighbors_directed(i, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|i| self.graph[i].id.as_str())
            .collect()
    }

    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    /// Raw petgraph access for engines that walk the graph themselves
    pub fn graph(&self) -> &DiGraph<ActivityNode, Connection> {
        &self.graph
    }
}

/// Structural equality: same nodes and connections in the same order
impl PartialEq for ExecutableGraph {
    fn eq(&self, other: &Self) -> bool {
        self.definition_id == other.definition_id
            && self.definition_version == other.definition_version
            && self.nodes().eq(other.nodes())
            && self.connections().eq(other.connections())
    }
}
