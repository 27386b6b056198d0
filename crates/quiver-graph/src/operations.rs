//! GraphOperations implementation backed by petgraph.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use quiver_core::error::{QuiverError, QuiverResult};
use quiver_core::traits::{
    ConnectedElement, ConnectedOptions, ElementPath, GraphOperations, PathOptions,
    RelationshipStats,
};
use quiver_core::types::{CapabilityIndex, ElementId};

use crate::discovery::discover_references;
use crate::element_graph::ElementGraph;

/// What a cached graph was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GraphStamp {
    last_updated: DateTime<Utc>,
    elements: usize,
    relationships: usize,
}

impl GraphStamp {
    fn of(index: &CapabilityIndex) -> Self {
        Self {
            last_updated: index.metadata.last_updated,
            elements: index.element_count(),
            relationships: index.relationship_count(),
        }
    }
}

/// Graph operations over a capability index, with the last built graph
/// cached until the index changes.
#[derive(Default)]
pub struct PetgraphOperations {
    cache: Mutex<Option<(GraphStamp, Arc<ElementGraph>)>>,
}

impl PetgraphOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a built graph is currently held.
    pub fn is_cached(&self) -> bool {
        self.cache.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    /// The graph for `index`, rebuilt when the index has changed.
    pub fn graph_for(&self, index: &CapabilityIndex) -> Arc<ElementGraph> {
        let stamp = GraphStamp::of(index);
        let Ok(mut cache) = self.cache.lock() else {
            return Arc::new(ElementGraph::from_index(index));
        };
        if let Some((cached_stamp, graph)) = cache.as_ref() {
            if *cached_stamp == stamp {
                return Arc::clone(graph);
            }
        }

        let graph = Arc::new(ElementGraph::from_index(index));
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Built element graph"
        );
        *cache = Some((stamp, Arc::clone(&graph)));
        graph
    }
}

fn locate(graph: &ElementGraph, id: &ElementId) -> QuiverResult<petgraph::graph::NodeIndex> {
    graph
        .find(&id.to_string())
        .ok_or_else(|| QuiverError::not_found(id.to_string()))
}

#[async_trait]
impl GraphOperations for PetgraphOperations {
    async fn discover_relationships(&self, index: &mut CapabilityIndex) -> QuiverResult<usize> {
        let added = discover_references(index);
        debug!(added, "Reference discovery complete");
        Ok(added)
    }

    async fn find_path(
        &self,
        index: &CapabilityIndex,
        from: &ElementId,
        to: &ElementId,
        options: &PathOptions,
    ) -> QuiverResult<Option<ElementPath>> {
        let graph = self.graph_for(index);
        let start = locate(&graph, from)?;
        let end = locate(&graph, to)?;

        let Some(steps) =
            graph.shortest_path(start, end, options.max_depth, &options.relationship_kinds)
        else {
            return Ok(None);
        };

        let mut path = ElementPath {
            elements: Vec::with_capacity(steps.len()),
            relationship_kinds: Vec::with_capacity(steps.len().saturating_sub(1)),
            strength: 1.0,
        };
        for step in steps {
            if let Some(node) = graph.node(step.node) {
                path.elements.push(node.identity.clone());
            }
            if let Some(edge) = step.via.and_then(|e| graph.edge(e)) {
                path.relationship_kinds.push(edge.kind.clone());
                path.strength *= edge.strength;
            }
        }
        Ok(Some(path))
    }

    async fn connected_elements(
        &self,
        index: &CapabilityIndex,
        element: &ElementId,
        options: &ConnectedOptions,
    ) -> QuiverResult<Vec<ConnectedElement>> {
        let graph = self.graph_for(index);
        let start = locate(&graph, element)?;

        let mut connected: Vec<ConnectedElement> = graph
            .expand(
                start,
                options.max_depth,
                options.min_strength,
                &options.relationship_kinds,
            )
            .into_iter()
            .filter_map(|(node, depth, strength)| {
                graph.node(node).map(|n| ConnectedElement {
                    element: n.identity.clone(),
                    depth,
                    strength,
                })
            })
            .collect();
        connected.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.element.cmp(&b.element)));
        Ok(connected)
    }

    async fn relationship_stats(&self, index: &CapabilityIndex) -> QuiverResult<RelationshipStats> {
        let graph = self.graph_for(index);
        let inner = graph.graph();

        let mut stats = RelationshipStats {
            total_relationships: graph.edge_count(),
            connected_components: graph.component_count(),
            ..Default::default()
        };
        for edge in inner.edge_weights() {
            *stats.by_kind.entry(edge.kind.clone()).or_insert(0) += 1;
        }
        for node in inner.node_indices() {
            if inner.neighbors_undirected(node).next().is_some() {
                stats.elements_with_relationships += 1;
            } else {
                stats.isolated_elements += 1;
            }
        }
        if graph.node_count() > 0 {
            stats.average_out_degree = graph.edge_count() as f64 / graph.node_count() as f64;
        }
        Ok(stats)
    }

    fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::index_with;

    fn sample() -> CapabilityIndex {
        index_with(
            &[
                ("personas", "Debug Helper"),
                ("skills", "Code Review"),
                ("skills", "Linting"),
                ("templates", "Report"),
            ],
            &[
                ("personas:Debug Helper", "skills:Code Review", "similar", 0.8),
                ("skills:Code Review", "personas:Debug Helper", "similar", 0.8),
                ("skills:Code Review", "skills:Linting", "similar", 0.5),
                ("skills:Linting", "skills:Code Review", "similar", 0.5),
            ],
        )
    }

    fn id(raw: &str) -> ElementId {
        ElementId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_find_path() {
        let ops = PetgraphOperations::new();
        let index = sample();

        let path = ops
            .find_path(
                &index,
                &id("personas:Debug Helper"),
                &id("skills:Linting"),
                &PathOptions::default(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            path.elements,
            vec!["personas:Debug Helper", "skills:Code Review", "skills:Linting"]
        );
        assert_eq!(path.hops(), 2);
        assert!((path.strength - 0.4).abs() < 1e-9);

        let none = ops
            .find_path(
                &index,
                &id("personas:Debug Helper"),
                &id("templates:Report"),
                &PathOptions::default(),
            )
            .await
            .unwrap();
        assert!(none.is_none());

        let err = ops
            .find_path(
                &index,
                &id("personas:Debug Helper"),
                &id("skills:Missing"),
                &PathOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QuiverError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_connected_elements() {
        let ops = PetgraphOperations::new();
        let index = sample();

        let all = ops
            .connected_elements(&index, &id("personas:Debug Helper"), &ConnectedOptions::default())
            .await
            .unwrap();
        let reached: Vec<(&str, usize)> = all.iter().map(|c| (c.element.as_str(), c.depth)).collect();
        assert_eq!(reached, vec![("skills:Code Review", 1), ("skills:Linting", 2)]);

        let strong = ops
            .connected_elements(
                &index,
                &id("personas:Debug Helper"),
                &ConnectedOptions {
                    min_strength: 0.6,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(strong.len(), 1);
    }

    #[tokio::test]
    async fn test_relationship_stats() {
        let ops = PetgraphOperations::new();
        let stats = ops.relationship_stats(&sample()).await.unwrap();
        assert_eq!(stats.total_relationships, 4);
        assert_eq!(stats.by_kind["similar"], 4);
        assert_eq!(stats.elements_with_relationships, 3);
        assert_eq!(stats.isolated_elements, 1);
        assert_eq!(stats.connected_components, 2);
        assert!((stats.average_out_degree - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_graph_cache_follows_index() {
        let ops = PetgraphOperations::new();
        let mut index = sample();
        assert!(!ops.is_cached());

        let first = ops.graph_for(&index);
        let again = ops.graph_for(&index);
        assert!(Arc::ptr_eq(&first, &again));

        index
            .get_mut(&id("templates:Report"))
            .unwrap()
            .add_relationship(
                "similar",
                quiver_core::Relationship::new("skills:Linting", "similar", 0.9),
            );
        let rebuilt = ops.graph_for(&index);
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(rebuilt.edge_count(), 5);

        ops.clear_cache();
        assert!(!ops.is_cached());
    }
}
