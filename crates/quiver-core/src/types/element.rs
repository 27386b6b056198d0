//! Element definition types stored in the capability index.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unrecognised fields carried through load/save untouched.
pub type ExtraFields = BTreeMap<String, serde_yaml::Value>;

/// Relationship kind holding semantic-similarity edges.
pub const SIMILAR_KIND: &str = "similar";

/// Relationship type written by the sampler.
pub const SEMANTIC_SIMILARITY: &str = "semantic_similarity";

/// Identity and bookkeeping for one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementCore {
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    pub updated: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Author-supplied search hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// An action an element responds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    pub verb: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ActionDef {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            behavior: None,
            confidence: None,
            extra: ExtraFields::new(),
        }
    }

    pub fn with_behavior(mut self, behavior: impl Into<String>) -> Self {
        self.behavior = Some(behavior.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }
}

/// A typed edge from one element to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Target identity (`type:name`).
    pub element: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    /// Edge strength in [0, 1].
    pub strength: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_yaml::Value>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Relationship {
    /// Create a new relationship edge.
    pub fn new(
        element: impl Into<String>,
        relationship_type: impl Into<String>,
        strength: f64,
    ) -> Self {
        Self {
            element: element.into(),
            relationship_type: relationship_type.into(),
            strength: strength.clamp(0.0, 1.0),
            metadata: BTreeMap::new(),
            extra: ExtraFields::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Lexical statistics for an element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticInfo {
    pub entropy: f64,
    pub unique_terms: usize,
    /// Peer identity -> Jaccard score.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub similarities: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// One content item's record in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDefinition {
    pub core: ElementCore,
    #[serde(default)]
    pub search: SearchHints,
    /// `None` means never generated; carried forward verbatim once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<BTreeMap<String, ActionDef>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, Vec<Relationship>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticInfo>,
    /// Caller-owned data, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_yaml::Value>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ElementDefinition {
    /// `type:name` identity.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.core.element_type, self.core.name)
    }

    /// Text used for entropy and similarity: name, description, keywords,
    /// tags, and triggers.
    pub fn similarity_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.core.name.as_str()];
        if let Some(description) = &self.core.description {
            parts.push(description);
        }
        parts.extend(self.search.keywords.iter().map(String::as_str));
        parts.extend(self.search.tags.iter().map(String::as_str));
        parts.extend(self.search.triggers.iter().map(String::as_str));
        parts.join(" ")
    }

    /// Edges of one relationship kind.
    pub fn relationships_of(&self, kind: &str) -> &[Relationship] {
        self.relationships.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any relationship kind holds at least one edge.
    pub fn has_relationships(&self) -> bool {
        self.relationships.values().any(|edges| !edges.is_empty())
    }

    /// Append an edge unless one to the same target already exists in this
    /// kind. Returns whether the edge was inserted.
    pub fn add_relationship(&mut self, kind: &str, edge: Relationship) -> bool {
        let edges = self.relationships.entry(kind.to_string()).or_default();
        if edges.iter().any(|existing| existing.element == edge.element) {
            return false;
        }
        edges.push(edge);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str) -> ElementDefinition {
        ElementDefinition {
            core: ElementCore {
                name: name.to_string(),
                element_type: "skills".to_string(),
                version: None,
                description: Some("Reviews code".to_string()),
                created: None,
                updated: Utc::now(),
                extra: ExtraFields::new(),
            },
            search: SearchHints {
                keywords: vec!["code".into()],
                tags: vec!["quality".into()],
                triggers: vec!["review".into()],
                extra: ExtraFields::new(),
            },
            actions: None,
            relationships: BTreeMap::new(),
            semantic: None,
            custom: None,
            extra: ExtraFields::new(),
        }
    }

    #[test]
    fn test_identity_and_text() {
        let def = definition("Code Review");
        assert_eq!(def.identity(), "skills:Code Review");
        assert_eq!(def.similarity_text(), "Code Review Reviews code code quality review");
    }

    #[test]
    fn test_add_relationship_first_writer_wins() {
        let mut def = definition("Code Review");
        assert!(def.add_relationship(SIMILAR_KIND, Relationship::new("skills:A", SEMANTIC_SIMILARITY, 0.4)));
        assert!(!def.add_relationship(SIMILAR_KIND, Relationship::new("skills:A", SEMANTIC_SIMILARITY, 0.9)));

        let edges = def.relationships_of(SIMILAR_KIND);
        assert_eq!(edges.len(), 1);
        assert!((edges[0].strength - 0.4).abs() < f64::EPSILON);
        assert!(def.has_relationships());
    }

    #[test]
    fn test_strength_is_clamped() {
        let edge = Relationship::new("skills:A", "uses", 3.0);
        assert!((edge.strength - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let yaml = r#"
core:
  name: Code Review
  type: skills
  updated: 2024-05-01T00:00:00Z
  author_note: keep me
search:
  keywords: [code]
custom:
  owner: team-a
future_section:
  enabled: true
"#;
        let def: ElementDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.core.extra.contains_key("author_note"));
        assert!(def.extra.contains_key("future_section"));

        let out = serde_yaml::to_string(&def).unwrap();
        assert!(out.contains("author_note: keep me"));
        assert!(out.contains("future_section"));
        assert!(out.contains("owner: team-a"));
    }
}
