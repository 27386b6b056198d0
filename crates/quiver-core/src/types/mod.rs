//! Core types for quiver.

mod catalog;
mod element;
mod identity;
mod index;

pub use catalog::{parse_timestamp, CatalogEntry};
pub use element::{
    ActionDef, ElementCore, ElementDefinition, ExtraFields, Relationship, SearchHints,
    SemanticInfo, SEMANTIC_SIMILARITY, SIMILAR_KIND,
};
pub use identity::ElementId;
pub use index::{register_trigger, CapabilityIndex, ElementMap, IndexMetadata, INDEX_SCHEMA_VERSION};
