//! Shared in-memory copy of the capability index.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::types::CapabilityIndex;

#[derive(Debug)]
struct CachedIndex {
    index: Arc<CapabilityIndex>,
    cached_at: Instant,
}

/// The engine's in-memory index slot. Cloning shares the slot.
#[derive(Debug, Clone, Default)]
pub struct IndexCache {
    inner: Arc<RwLock<Option<CachedIndex>>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<Arc<CapabilityIndex>> {
        self.inner
            .read()
            .await
            .as_ref()
            .map(|cached| Arc::clone(&cached.index))
    }

    /// Time since the current copy was stored.
    pub async fn age(&self) -> Option<Duration> {
        self.inner
            .read()
            .await
            .as_ref()
            .map(|cached| cached.cached_at.elapsed())
    }

    pub async fn put(&self, index: Arc<CapabilityIndex>) {
        *self.inner.write().await = Some(CachedIndex {
            index,
            cached_at: Instant::now(),
        });
    }

    /// Drop the copy. Returns whether one was present.
    pub async fn clear(&self) -> bool {
        self.inner.write().await.take().is_some()
    }

    /// Drop the copy if it is older than `max_age`. Returns its age when
    /// evicted.
    pub async fn evict_older_than(&self, max_age: Duration) -> Option<Duration> {
        let mut slot = self.inner.write().await;
        let age = slot.as_ref()?.cached_at.elapsed();
        if age > max_age {
            *slot = None;
            Some(age)
        } else {
            None
        }
    }
}
