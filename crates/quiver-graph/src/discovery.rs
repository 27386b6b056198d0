//! Cross-reference discovery.
//!
//! An element whose description names another element, as a whole word and
//! ignoring case, gets a mirrored `references` edge to it.

use tracing::debug;

use quiver_core::types::{CapabilityIndex, ElementId, Relationship};

/// Relationship kind written by discovery.
pub const REFERENCES_KIND: &str = "references";

/// Relationship type written by discovery.
pub const CROSS_REFERENCE: &str = "cross_reference";

/// Add `references` edges for every name mention. Existing edges win.
/// Returns the number of edges added.
pub fn discover_references(index: &mut CapabilityIndex) -> usize {
    let names: Vec<(ElementId, String)> = index
        .iter_elements()
        .map(|def| {
            (
                ElementId::new(def.core.element_type.as_str(), def.core.name.as_str()),
                def.core.name.to_lowercase(),
            )
        })
        .collect();

    let mut pairs = Vec::new();
    for def in index.iter_elements() {
        let Some(description) = def.core.description.as_deref() else {
            continue;
        };
        let description = description.to_lowercase();
        let source = ElementId::new(def.core.element_type.as_str(), def.core.name.as_str());
        for (target, name) in &names {
            if *target != source && mentions(&description, name) {
                pairs.push((source.clone(), target.clone()));
            }
        }
    }

    let mut added = 0;
    for (a, b) in pairs {
        for (from, to) in [(&a, &b), (&b, &a)] {
            let Some(def) = index.get_mut(from) else {
                continue;
            };
            let edge = Relationship::new(to.to_string(), CROSS_REFERENCE, 1.0);
            if def.add_relationship(REFERENCES_KIND, edge) {
                debug!(from = %from, to = %to, "Discovered reference");
                added += 1;
            }
        }
    }
    added
}

/// Whether `needle` occurs in `haystack` with no word character on
/// either side. Both are expected lowercased.
pub fn mentions(haystack: &str, needle: &str) -> bool {
    if needle.trim().is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(needle).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}
