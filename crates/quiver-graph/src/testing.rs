//! Index fixtures shared by unit tests.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use quiver_core::types::{
    CapabilityIndex, ElementCore, ElementDefinition, ElementId, ExtraFields, Relationship,
    SearchHints,
};

pub(crate) fn element(element_type: &str, name: &str, description: Option<&str>) -> ElementDefinition {
    ElementDefinition {
        core: ElementCore {
            name: name.to_string(),
            element_type: element_type.to_string(),
            version: None,
            description: description.map(String::from),
            created: None,
            updated: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            extra: ExtraFields::new(),
        },
        search: SearchHints::default(),
        actions: None,
        relationships: BTreeMap::new(),
        semantic: None,
        custom: None,
        extra: ExtraFields::new(),
    }
}

pub(crate) fn insert(index: &mut CapabilityIndex, def: ElementDefinition) {
    index
        .elements
        .entry(def.core.element_type.clone())
        .or_default()
        .insert(def.core.name.clone(), def);
}

/// Index with the given `(type, name)` elements and `(from, to, kind, strength)` edges.
pub(crate) fn index_with(
    names: &[(&str, &str)],
    edges: &[(&str, &str, &str, f64)],
) -> CapabilityIndex {
    let mut index = CapabilityIndex::new();
    for (element_type, name) in names {
        insert(&mut index, element(element_type, name, None));
    }
    for (from, to, kind, strength) in edges {
        let id = ElementId::parse(from).unwrap();
        index
            .get_mut(&id)
            .unwrap()
            .add_relationship(kind, Relationship::new(*to, *kind, *strength));
    }
    index.touch();
    index
}
