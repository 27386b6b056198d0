//! The persisted capability index.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::element::{ElementDefinition, ExtraFields};
use super::identity::ElementId;

/// Schema version written into new indexes.
pub const INDEX_SCHEMA_VERSION: &str = "2.0.0";

/// Type bucket -> element name -> definition.
pub type ElementMap = BTreeMap<String, BTreeMap<String, ElementDefinition>>;

/// Index-level bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub version: String,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub total_elements: usize,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Root persisted object: elements, verb triggers, and caller extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityIndex {
    pub metadata: IndexMetadata,
    /// Normalised verb -> element names, insertion ordered, no duplicates.
    pub action_triggers: BTreeMap<String, Vec<String>>,
    pub elements: ElementMap,
    /// Named blobs owned by external callers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_yaml::Value>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Default for CapabilityIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityIndex {
    /// Create an empty index stamped with the current time.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            metadata: IndexMetadata {
                version: INDEX_SCHEMA_VERSION.to_string(),
                created: now,
                last_updated: now,
                total_elements: 0,
                extra: ExtraFields::new(),
            },
            action_triggers: BTreeMap::new(),
            elements: ElementMap::new(),
            extensions: BTreeMap::new(),
            extra: ExtraFields::new(),
        }
    }

    /// Count of entries across all type buckets.
    pub fn element_count(&self) -> usize {
        self.elements.values().map(BTreeMap::len).sum()
    }

    /// Recompute `total_elements` and bump `last_updated`.
    pub fn touch(&mut self) {
        self.metadata.total_elements = self.element_count();
        self.metadata.last_updated = Utc::now();
    }

    pub fn get(&self, id: &ElementId) -> Option<&ElementDefinition> {
        self.elements.get(&id.element_type)?.get(&id.name)
    }

    pub fn get_mut(&mut self, id: &ElementId) -> Option<&mut ElementDefinition> {
        self.elements.get_mut(&id.element_type)?.get_mut(&id.name)
    }

    pub fn contains(&self, id: &ElementId) -> bool {
        self.get(id).is_some()
    }

    /// Iterate every definition across all types.
    pub fn iter_elements(&self) -> impl Iterator<Item = &ElementDefinition> {
        self.elements.values().flat_map(BTreeMap::values)
    }

    /// Element names registered for a normalised verb.
    pub fn elements_for_verb(&self, verb: &str) -> &[String] {
        self.action_triggers
            .get(verb)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of relationship edges of every kind.
    pub fn relationship_count(&self) -> usize {
        self.iter_elements()
            .flat_map(|def| def.relationships.values())
            .map(Vec::len)
            .sum()
    }

    /// Remove edges (and similarity scores) pointing at identities that are
    /// no longer present. Returns the number of edges removed.
    pub fn prune_dangling_relationships(&mut self) -> usize {
        let live: std::collections::HashSet<String> = self
            .iter_elements()
            .map(ElementDefinition::identity)
            .collect();

        let mut removed = 0;
        for bucket in self.elements.values_mut() {
            for def in bucket.values_mut() {
                for edges in def.relationships.values_mut() {
                    let before = edges.len();
                    edges.retain(|edge| live.contains(&edge.element));
                    removed += before - edges.len();
                }
                def.relationships.retain(|_, edges| !edges.is_empty());
                if let Some(semantic) = def.semantic.as_mut() {
                    semantic.similarities.retain(|peer, _| live.contains(peer));
                }
            }
        }
        removed
    }
}

/// Register `name` under `verb`, keeping insertion order and no duplicates.
pub fn register_trigger(
    action_triggers: &mut BTreeMap<String, Vec<String>>,
    verb: &str,
    name: &str,
) {
    let names = action_triggers.entry(verb.to_string()).or_default();
    if !names.iter().any(|existing| existing == name) {
        names.push(name.to_string());
    }
}
