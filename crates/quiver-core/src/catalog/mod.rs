//! Element catalog implementations.

mod portfolio;

pub use portfolio::{parse_front_matter, PortfolioCatalog};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::QuiverResult;
use crate::traits::{CatalogListing, ElementCatalog};
use crate::types::CatalogEntry;

/// In-memory catalog.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    entries: RwLock<CatalogListing>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries, grouped by each entry's own type.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut listing = CatalogListing::new();
        for entry in entries {
            listing
                .entry(entry.element_type.clone())
                .or_default()
                .push(entry);
        }
        Self {
            entries: RwLock::new(listing),
        }
    }

    pub async fn insert(&self, entry: CatalogEntry) {
        self.entries
            .write()
            .await
            .entry(entry.element_type.clone())
            .or_default()
            .push(entry);
    }

    /// Replace the entry with the same type and name, or add it.
    pub async fn upsert(&self, entry: CatalogEntry) {
        let mut entries = self.entries.write().await;
        let bucket = entries.entry(entry.element_type.clone()).or_default();
        match bucket
            .iter_mut()
            .find(|existing| existing.usable_name() == entry.usable_name())
        {
            Some(existing) => *existing = entry,
            None => bucket.push(entry),
        }
    }

    /// Remove by type and name. Returns whether anything was removed.
    pub async fn remove(&self, element_type: &str, name: &str) -> bool {
        let mut entries = self.entries.write().await;
        let Some(bucket) = entries.get_mut(element_type) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|entry| entry.usable_name() != Some(name));
        before != bucket.len()
    }
}

#[async_trait]
impl ElementCatalog for StaticCatalog {
    async fn list_entries(&self) -> QuiverResult<CatalogListing> {
        Ok(self.entries.read().await.clone())
    }
}
