use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::service::ServiceId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rendering hint; the core carries it through untouched.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureNode {
    pub id: NodeId,
    pub service: ServiceId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl ArchitectureNode {
    pub fn new(id: impl Into<String>, service: impl Into<String>, quantity: u32) -> Self {
        Self { id: NodeId::new(id), service: ServiceId::new(service), quantity, position: None }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }
}

fn default_quantity() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArchitectureEdge {
    pub from: NodeId,
    pub to: NodeId,
}

impl ArchitectureEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: NodeId::new(from), to: NodeId::new(to) }
    }
}

/// Unvalidated wire shape of an architecture.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureSpec {
    #[serde(default)]
    pub nodes: Vec<ArchitectureNode>,
    #[serde(default)]
    pub edges: Vec<ArchitectureEdge>,
}

/// Service graph with unique node ids and edges between existing nodes only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ArchitectureSpec", into = "ArchitectureSpec")]
pub struct Architecture {
    nodes: Vec<ArchitectureNode>,
    edges: BTreeSet<ArchitectureEdge>,
}

impl Architecture {
    pub fn new(
        nodes: Vec<ArchitectureNode>,
        edges: Vec<ArchitectureEdge>,
    ) -> Result<Self, DomainError> {
        let mut seen = BTreeSet::new();
        for node in &nodes {
            if node.id.as_str().trim().is_empty() {
                return Err(DomainError::InvariantViolation(
                    "architecture node id must not be empty".to_owned(),
                ));
            }
            if !seen.insert(node.id.clone()) {
                return Err(DomainError::InvariantViolation(format!(
                    "duplicate architecture node id `{}`",
                    node.id
                )));
            }
            if node.quantity == 0 {
                return Err(DomainError::InvalidQuantity {
                    service: node.service.to_string(),
                    quantity: 0,
                });
            }
        }

        let mut collapsed = BTreeSet::new();
        for edge in edges {
            if edge.from == edge.to {
                return Err(DomainError::InvariantViolation(format!(
                    "self-loop on node `{}`",
                    edge.from
                )));
            }
            for endpoint in [&edge.from, &edge.to] {
                if !seen.contains(endpoint) {
                    return Err(DomainError::InvariantViolation(format!(
                        "edge {} -> {} references unknown node `{endpoint}`",
                        edge.from, edge.to
                    )));
                }
            }
            collapsed.insert(edge);
        }

        Ok(Self { nodes, edges: collapsed })
    }

    pub fn empty() -> Self {
        Self { nodes: Vec::new(), edges: BTreeSet::new() }
    }

    pub fn nodes(&self) -> &[ArchitectureNode] {
        &self.nodes
    }

    pub fn edges(&self) -> impl Iterator<Item = &ArchitectureEdge> {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: &NodeId) -> Option<&ArchitectureNode> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    pub fn predecessors<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.edges.iter().filter(move |edge| &edge.to == id).map(|edge| &edge.from)
    }

    pub fn successors<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.edges.iter().filter(move |edge| &edge.from == id).map(|edge| &edge.to)
    }

    /// (in-degree, out-degree) for every node, including isolated ones.
    pub fn degrees(&self) -> BTreeMap<&NodeId, (usize, usize)> {
        let mut degrees =
            self.nodes.iter().map(|node| (&node.id, (0, 0))).collect::<BTreeMap<_, _>>();
        for edge in &self.edges {
            if let Some(entry) = degrees.get_mut(&edge.to) {
                entry.0 += 1;
            }
            if let Some(entry) = degrees.get_mut(&edge.from) {
                entry.1 += 1;
            }
        }
        degrees
    }
}

impl TryFrom<ArchitectureSpec> for Architecture {
    type Error = DomainError;

    fn try_from(spec: ArchitectureSpec) -> Result<Self, Self::Error> {
        Self::new(spec.nodes, spec.edges)
    }
}

impl From<Architecture> for ArchitectureSpec {
    fn from(architecture: Architecture) -> Self {
        Self { nodes: architecture.nodes, edges: architecture.edges.into_iter().collect() }
    }
}
