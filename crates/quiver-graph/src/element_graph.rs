//! In-memory element graph using petgraph DiGraph.
//!
//! One node per element, one edge per stored relationship of any kind.
//! Edges whose target is not in the index are left out.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use quiver_core::types::CapabilityIndex;

/// Node data in the element graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    /// `type:name` identity.
    pub identity: String,
    pub element_type: String,
    pub name: String,
}

/// Edge data in the element graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Relationship kind the edge was stored under (e.g. `similar`).
    pub kind: String,
    pub strength: f64,
}

/// The graph type.
pub type IndexGraph = DiGraph<ElementNode, EdgeData>;

/// Index for O(1) lookups by identity.
pub type IdentityIndex = HashMap<String, NodeIndex>;

/// One step of a traversal: the node reached and the edge used to reach it.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub node: NodeIndex,
    pub via: Option<EdgeIndex>,
}

/// Graph built from one capability index snapshot.
#[derive(Debug, Clone, Default)]
pub struct ElementGraph {
    graph: IndexGraph,
    identities: IdentityIndex,
}

impl ElementGraph {
    /// Build the graph from every element and relationship in the index.
    pub fn from_index(index: &CapabilityIndex) -> Self {
        let mut graph = IndexGraph::new();
        let mut identities = IdentityIndex::new();

        for def in index.iter_elements() {
            let identity = def.identity();
            let idx = graph.add_node(ElementNode {
                identity: identity.clone(),
                element_type: def.core.element_type.clone(),
                name: def.core.name.clone(),
            });
            identities.insert(identity, idx);
        }

        for def in index.iter_elements() {
            let Some(&source) = identities.get(&def.identity()) else {
                continue;
            };
            for (kind, edges) in &def.relationships {
                for edge in edges {
                    if let Some(&target) = identities.get(&edge.element) {
                        graph.add_edge(
                            source,
                            target,
                            EdgeData {
                                kind: kind.clone(),
                                strength: edge.strength,
                            },
                        );
                    }
                }
            }
        }

        Self { graph, identities }
    }

    pub fn find(&self, identity: &str) -> Option<NodeIndex> {
        self.identities.get(identity).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&ElementNode> {
        self.graph.node_weight(idx)
    }

    pub fn edge(&self, idx: EdgeIndex) -> Option<&EdgeData> {
        self.graph.edge_weight(idx)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn graph(&self) -> &IndexGraph {
        &self.graph
    }

    /// Outgoing edges whose kind passes `kinds` (empty allows all).
    pub fn outgoing<'a>(
        &'a self,
        node: NodeIndex,
        kinds: &'a [String],
    ) -> impl Iterator<Item = (EdgeIndex, NodeIndex, &'a EdgeData)> + 'a {
        self.graph
            .edges(node)
            .filter(move |e| kinds.is_empty() || kinds.contains(&e.weight().kind))
            .map(|e| (e.id(), e.target(), e.weight()))
    }

    /// Shortest hop path from `from` to `to`, at most `max_depth` hops.
    ///
    /// Returns the steps from start to end; the first step has no edge.
    pub fn shortest_path(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        max_depth: usize,
        kinds: &[String],
    ) -> Option<Vec<Step>> {
        if from == to {
            return Some(vec![Step {
                node: from,
                via: None,
            }]);
        }

        let mut parent: HashMap<NodeIndex, (NodeIndex, EdgeIndex)> = HashMap::new();
        let mut queue = VecDeque::from([(from, 0usize)]);

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (edge, next, _) in self.outgoing(node, kinds) {
                if next == from || parent.contains_key(&next) {
                    continue;
                }
                parent.insert(next, (node, edge));
                if next == to {
                    return Some(self.unwind(from, to, &parent));
                }
                queue.push_back((next, depth + 1));
            }
        }
        None
    }

    fn unwind(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        parent: &HashMap<NodeIndex, (NodeIndex, EdgeIndex)>,
    ) -> Vec<Step> {
        let mut steps = Vec::new();
        let mut current = to;
        while current != from {
            let Some(&(prev, edge)) = parent.get(&current) else {
                break;
            };
            steps.push(Step {
                node: current,
                via: Some(edge),
            });
            current = prev;
        }
        steps.push(Step {
            node: from,
            via: None,
        });
        steps.reverse();
        steps
    }

    /// Breadth-first expansion from `start`, following edges at least
    /// `min_strength` strong. Returns `(node, depth, path strength)` for
    /// every reached node other than `start`.
    pub fn expand(
        &self,
        start: NodeIndex,
        max_depth: usize,
        min_strength: f64,
        kinds: &[String],
    ) -> Vec<(NodeIndex, usize, f64)> {
        let mut reached: HashMap<NodeIndex, (usize, f64)> = HashMap::from([(start, (0, 1.0))]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            let (depth, strength) = reached[&node];
            if depth >= max_depth {
                continue;
            }
            for (_, next, data) in self.outgoing(node, kinds) {
                if data.strength < min_strength || reached.contains_key(&next) {
                    continue;
                }
                let entry = (depth + 1, strength * data.strength);
                reached.insert(next, entry);
                order.push((next, entry.0, entry.1));
                queue.push_back(next);
            }
        }
        order
    }

    /// Number of weakly connected components.
    pub fn component_count(&self) -> usize {
        petgraph::algo::connected_components(&self.graph)
    }
}
