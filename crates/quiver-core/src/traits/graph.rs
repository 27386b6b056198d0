//! Graph operations trait and related types.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QuiverResult;
use crate::types::{CapabilityIndex, ElementId};

/// Options for path finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathOptions {
    /// Maximum number of hops.
    pub max_depth: usize,
    /// Relationship kinds that may be traversed. Empty means all.
    #[serde(default)]
    pub relationship_kinds: Vec<String>,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            max_depth: 5,
            relationship_kinds: Vec::new(),
        }
    }
}

/// Options for neighbourhood expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedOptions {
    /// Maximum number of hops from the start element.
    pub max_depth: usize,
    /// Edges weaker than this are not followed.
    pub min_strength: f64,
    /// Relationship kinds that may be traversed. Empty means all.
    #[serde(default)]
    pub relationship_kinds: Vec<String>,
}

impl Default for ConnectedOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            min_strength: 0.0,
            relationship_kinds: Vec::new(),
        }
    }
}

/// A path between two elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementPath {
    /// Identities from start to end, inclusive.
    pub elements: Vec<String>,
    /// Relationship kind of each hop.
    pub relationship_kinds: Vec<String>,
    /// Product of edge strengths along the path.
    pub strength: f64,
}

impl ElementPath {
    pub fn hops(&self) -> usize {
        self.relationship_kinds.len()
    }
}

/// An element reached while expanding a neighbourhood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedElement {
    pub element: String,
    pub depth: usize,
    /// Product of edge strengths along the path used to reach it.
    pub strength: f64,
}

/// Aggregate relationship statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipStats {
    pub total_relationships: usize,
    pub by_kind: BTreeMap<String, usize>,
    pub elements_with_relationships: usize,
    pub isolated_elements: usize,
    pub average_out_degree: f64,
    pub connected_components: usize,
}

/// Core GraphOperations trait - traversal and discovery over index relationships.
#[async_trait]
pub trait GraphOperations: Send + Sync {
    /// Add discovered relationships to the index. Returns edges added.
    async fn discover_relationships(&self, index: &mut CapabilityIndex) -> QuiverResult<usize>;

    /// Shortest path between two elements, if one exists within the options.
    async fn find_path(
        &self,
        index: &CapabilityIndex,
        from: &ElementId,
        to: &ElementId,
        options: &PathOptions,
    ) -> QuiverResult<Option<ElementPath>>;

    /// Elements reachable from `element` within the options.
    async fn connected_elements(
        &self,
        index: &CapabilityIndex,
        element: &ElementId,
        options: &ConnectedOptions,
    ) -> QuiverResult<Vec<ConnectedElement>>;

    /// Aggregate statistics over all relationships.
    async fn relationship_stats(&self, index: &CapabilityIndex) -> QuiverResult<RelationshipStats>;

    /// Drop any cached graph structures. Best effort.
    fn clear_cache(&self) {}
}
