//! Element catalog trait.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::QuiverResult;
use crate::types::CatalogEntry;

/// Catalog entries grouped by element type.
pub type CatalogListing = BTreeMap<String, Vec<CatalogEntry>>;

/// Source of the content items the index is built from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ElementCatalog: Send + Sync {
    /// List every entry, grouped by element type.
    async fn list_entries(&self) -> QuiverResult<CatalogListing>;
}
