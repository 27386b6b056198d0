//! Element definition builder.
//!
//! Turns a catalog entry into an [`ElementDefinition`], carrying forward
//! operator-owned data (custom fields, relationships, actions, similarity
//! scores) from the prior definition of the same element.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::warn;

use crate::types::{
    ActionDef, CatalogEntry, ElementCore, ElementDefinition, SearchHints, SemanticInfo,
};

const DEFAULT_ACTION_CONFIDENCE: f64 = 0.8;

/// Builds element definitions from catalog entries.
#[derive(Debug, Clone, Default)]
pub struct DefinitionBuilder;

impl DefinitionBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build a definition for `entry`.
    ///
    /// Returns `None` (with a warning) when the entry has no usable name.
    /// `element_type` is the catalog bucket the entry was listed under and
    /// wins over whatever the entry itself claims.
    ///
    /// Unknown fields and the `updated` stamp of an undated entry always
    /// come from `prior`. Custom fields, relationships, actions and
    /// similarity scores come from it only when `preserve_custom` is set.
    pub fn build(
        &self,
        element_type: &str,
        entry: &CatalogEntry,
        prior: Option<&ElementDefinition>,
        preserve_custom: bool,
    ) -> Option<ElementDefinition> {
        let Some(name) = entry.usable_name() else {
            warn!(element_type, "Skipping catalog entry without a name");
            return None;
        };

        let fallback = || prior.map(|p| p.core.updated).unwrap_or_else(Utc::now);
        let updated = match (&entry.updated, entry.updated_at()) {
            (_, Some(ts)) => ts,
            (Some(raw), None) => {
                warn!(element = name, raw = %raw, "Unparseable updated timestamp");
                fallback()
            }
            (None, None) => fallback(),
        };

        let core = ElementCore {
            name: name.to_string(),
            element_type: element_type.to_string(),
            version: entry.version.clone(),
            description: entry
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from),
            created: entry.created_at(),
            updated,
            extra: prior.map(|p| p.core.extra.clone()).unwrap_or_default(),
        };

        let search = SearchHints {
            keywords: clean_list(&entry.keywords),
            tags: clean_list(&entry.tags),
            triggers: clean_list(&entry.triggers),
            extra: prior.map(|p| p.search.extra.clone()).unwrap_or_default(),
        };

        let mut definition = ElementDefinition {
            core,
            search,
            actions: None,
            relationships: BTreeMap::new(),
            semantic: None,
            custom: None,
            extra: prior.map(|p| p.extra.clone()).unwrap_or_default(),
        };

        if let Some(semantic) = prior.and_then(|p| p.semantic.as_ref()) {
            let similarities = if preserve_custom {
                semantic.similarities.clone()
            } else {
                BTreeMap::new()
            };
            definition.semantic = Some(SemanticInfo {
                similarities,
                extra: semantic.extra.clone(),
                ..SemanticInfo::default()
            });
        }

        if let Some(prior) = prior.filter(|_| preserve_custom) {
            definition.custom = prior.custom.clone();
            definition.relationships = prior.relationships.clone();
            definition.actions = prior.actions.clone();
        }

        if definition.actions.is_none() {
            definition.actions = Some(if entry.actions.is_empty() {
                default_actions(element_type)
            } else {
                entry.actions.clone()
            });
        }

        Some(definition)
    }
}

/// Default action set for an element type.
pub fn default_actions(element_type: &str) -> BTreeMap<String, ActionDef> {
    let (verb, behavior) = match element_type {
        "personas" | "ensembles" => ("activate", "activate"),
        "skills" => ("use", "apply"),
        "templates" => ("render", "render"),
        "agents" => ("execute", "execute"),
        "memories" => ("recall", "recall"),
        _ => ("use", "use"),
    };
    let mut actions = BTreeMap::new();
    actions.insert(
        verb.to_string(),
        ActionDef::new(verb)
            .with_behavior(behavior)
            .with_confidence(DEFAULT_ACTION_CONFIDENCE),
    );
    actions
}

fn clean_list(values: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !cleaned.iter().any(|v| v == value) {
            cleaned.push(value.to_string());
        }
    }
    cleaned
}
