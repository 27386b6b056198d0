//! quiver-graph - Graph operations for quiver.
//!
//! Builds a petgraph view of a capability index and answers path,
//! neighbourhood, and statistics queries over it. Also discovers
//! cross-reference relationships from element descriptions.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quiver_graph::PetgraphOperations;
//!
//! let engine = engine.with_graph(Arc::new(PetgraphOperations::new()));
//! let path = engine.find_path("personas:Debug Helper", "skills:Linting", &Default::default()).await?;
//! ```

pub mod discovery;
pub mod element_graph;
mod operations;

#[cfg(test)]
mod testing;

pub use discovery::{discover_references, REFERENCES_KIND};
pub use element_graph::{EdgeData, ElementGraph, ElementNode};
pub use operations::PetgraphOperations;
