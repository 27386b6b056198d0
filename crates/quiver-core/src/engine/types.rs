//! Request and report types for the capability index engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sampling::SamplingReport;

/// Options for [`super::CapabilityIndexEngine::get_index`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GetIndexOptions {
    /// Rebuild even if the file is fresh.
    pub force_rebuild: bool,
    /// Rebuild only these elements (bare names or `type:name`); every other
    /// element is carried forward unchanged.
    pub update_only: Option<Vec<String>>,
    /// Carry custom fields, relationships, and actions forward from the
    /// prior index.
    pub preserve_custom: bool,
}

impl Default for GetIndexOptions {
    fn default() -> Self {
        Self {
            force_rebuild: false,
            update_only: None,
            preserve_custom: true,
        }
    }
}

impl GetIndexOptions {
    pub fn force_rebuild() -> Self {
        Self {
            force_rebuild: true,
            ..Default::default()
        }
    }

    pub fn update_only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            update_only: Some(names.into_iter().map(Into::into).collect()),
            preserve_custom: true,
            ..Default::default()
        }
    }

    /// Whether these options may be served from the cache or file.
    pub(crate) fn allows_cached(&self) -> bool {
        !self.force_rebuild && self.update_only.is_none()
    }
}

/// Criteria for [`super::CapabilityIndexEngine::search`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchCriteria {
    /// Action verbs; each match scores 2.
    pub verbs: Vec<String>,
    /// Keywords matched against keywords and tags; each match scores 1.
    pub keywords: Vec<String>,
    /// Restrict to one element type.
    pub element_type: Option<String>,
    /// Restrict to elements with (or without) relationships.
    pub has_relationships: Option<bool>,
    pub limit: Option<usize>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verb(mut self, verb: impl Into<String>) -> Self {
        self.verbs.push(verb.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn element_type(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }

    pub fn has_relationships(mut self, has: bool) -> Self {
        self.has_relationships = Some(has);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn has_terms(&self) -> bool {
        !self.verbs.is_empty() || !self.keywords.is_empty()
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementMatch {
    pub identity: String,
    pub element_type: String,
    pub name: String,
    pub score: u32,
    /// What matched, e.g. `verb:debug` or `keyword:code`.
    pub matched: Vec<String>,
}

/// Summary of one rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Definitions built from catalog entries.
    pub built: usize,
    /// Definitions copied from the prior index by a partial update.
    pub carried_forward: usize,
    /// Catalog entries skipped for lack of a usable name.
    pub skipped: usize,
    /// Elements whose trigger extraction hit the per-element cap.
    pub truncated_triggers: usize,
    /// Edges removed because their target no longer exists.
    pub pruned_edges: usize,
    pub sampling: SamplingReport,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

/// Index-wide counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_elements: usize,
    pub elements_by_type: BTreeMap<String, usize>,
    /// Distinct verbs in the trigger map.
    pub trigger_count: usize,
    pub relationship_count: usize,
    pub extension_count: usize,
    pub last_updated: DateTime<Utc>,
    pub last_build: Option<BuildReport>,
}
