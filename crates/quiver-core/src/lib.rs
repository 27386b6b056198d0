//! quiver-core - Core library for quiver.
//!
//! This crate builds and serves a capability index over a portfolio of
//! content elements: action-verb triggers, normalized element definitions,
//! and sampled similarity relationships, persisted as a YAML document.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quiver_core::{CapabilityIndexEngine, IndexConfig, PortfolioCatalog, TermSimilarity};
//!
//! let config = IndexConfig::builder().index_path("portfolio/capability-index.yaml").build();
//! let engine = CapabilityIndexEngine::new(
//!     config,
//!     Arc::new(PortfolioCatalog::new("portfolio")),
//!     Arc::new(TermSimilarity::new()),
//! )?;
//!
//! let index = engine.get_index(Default::default()).await?;
//! let debuggers = engine.elements_for_action("debug").await?;
//! ```

pub mod builder;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod guardian;
pub mod sampling;
pub mod similarity;
pub mod store;
pub mod traits;
pub mod triggers;
pub mod types;
pub mod validator;

// Re-export commonly used types
pub use catalog::{PortfolioCatalog, StaticCatalog};
pub use config::{GuardianConfig, IndexConfig, SamplingConfig, StoreConfig, TriggerConfig};
pub use engine::{
    BuildReport, CapabilityIndexEngine, ElementMatch, GetIndexOptions, IndexStats, SearchCriteria,
};
pub use error::{ErrorCode, QuiverError, QuiverResult};
pub use sampling::{SamplingReport, SamplingStrategy};
pub use similarity::TermSimilarity;
pub use store::{IndexStore, LoadOutcome};
pub use traits::{
    CatalogListing, ConnectedElement, ConnectedOptions, ContentValidator, ElementCatalog,
    ElementPath, GraphOperations, PathOptions, Relevance, RelationshipStats, TextSimilarity,
};
pub use types::{
    ActionDef, CapabilityIndex, CatalogEntry, ElementDefinition, ElementId, Relationship,
};
pub use validator::UnicodeContentValidator;
