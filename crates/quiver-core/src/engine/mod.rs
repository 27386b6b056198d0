//! Capability index engine.
//!
//! Serves the index from memory, from a fresh file, or by rebuilding it.
//! Rebuilds are serialized in-process by a gate mutex and across processes
//! by the file build lock. A caller that loses the lock race gets the last
//! known index instead of an error.

mod api;
mod types;

pub use types::{BuildReport, ElementMatch, GetIndexOptions, IndexStats, SearchCriteria};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::builder::DefinitionBuilder;
use crate::cache::IndexCache;
use crate::config::IndexConfig;
use crate::error::QuiverResult;
use crate::guardian::{CleanupTargets, MemoryGuardian};
use crate::sampling::RelationshipSampler;
use crate::store::{IndexStore, LoadOutcome};
use crate::traits::{ContentValidator, ElementCatalog, GraphOperations, TextSimilarity};
use crate::triggers::TriggerExtractor;
use crate::types::{CapabilityIndex, ElementId};

/// Main engine - builds, caches, and serves the capability index.
pub struct CapabilityIndexEngine {
    config: IndexConfig,
    catalog: Arc<dyn ElementCatalog>,
    similarity: Arc<dyn TextSimilarity>,
    graph: Option<Arc<dyn GraphOperations>>,
    store: IndexStore,
    extractor: TriggerExtractor,
    builder: DefinitionBuilder,
    sampler: RelationshipSampler,
    cache: IndexCache,
    build_gate: Mutex<()>,
    last_report: RwLock<Option<BuildReport>>,
    guardian: Mutex<Option<MemoryGuardian>>,
}

impl CapabilityIndexEngine {
    /// Create an engine.
    ///
    /// Fails fast on invalid configuration, including custom trigger
    /// patterns that do not compile or misclassify known words.
    pub fn new(
        config: IndexConfig,
        catalog: Arc<dyn ElementCatalog>,
        similarity: Arc<dyn TextSimilarity>,
    ) -> QuiverResult<Self> {
        config.validate()?;
        let extractor = TriggerExtractor::new(&config.triggers)?;
        let store = IndexStore::new(config.store.index_path.clone(), config.store.ttl());
        let sampler = RelationshipSampler::new(similarity.clone(), config.sampling.clone());

        Ok(Self {
            config,
            catalog,
            similarity,
            graph: None,
            store,
            extractor,
            builder: DefinitionBuilder::new(),
            sampler,
            cache: IndexCache::new(),
            build_gate: Mutex::new(()),
            last_report: RwLock::new(None),
            guardian: Mutex::new(None),
        })
    }

    /// Attach graph operations for path, neighbourhood, stats, and
    /// discovery queries.
    pub fn with_graph(mut self, graph: Arc<dyn GraphOperations>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Replace the content validator run before every save.
    pub fn with_validator(mut self, validator: Arc<dyn ContentValidator>) -> Self {
        self.store = self.store.with_validator(validator);
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Get the index, rebuilding or loading as needed.
    ///
    /// Staleness, lock contention, and sampling timeouts never surface as
    /// errors here. Catalog and persist failures do.
    pub async fn get_index(&self, options: GetIndexOptions) -> QuiverResult<Arc<CapabilityIndex>> {
        if options.allows_cached() {
            if let Some(index) = self.fresh_in_memory().await {
                return Ok(index);
            }
        }

        let _gate = self.build_gate.lock().await;

        // Someone may have finished a build while we waited.
        if options.allows_cached() {
            if let Some(index) = self.fresh_in_memory().await {
                return Ok(index);
            }
            if !self.store.is_stale().await {
                match self.store.load().await {
                    LoadOutcome::Loaded(index) => {
                        let index = Arc::new(*index);
                        self.cache.put(index.clone()).await;
                        return Ok(index);
                    }
                    LoadOutcome::Missing => info!("Index file missing, rebuilding"),
                    LoadOutcome::Invalid(reason) => {
                        warn!(reason = %reason, "Index file unusable, rebuilding")
                    }
                }
            }
        }

        self.rebuild(&options).await
    }

    /// Rebuild only the named elements, carrying everything else forward.
    pub async fn update_elements<I, S>(&self, names: I) -> QuiverResult<Arc<CapabilityIndex>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.get_index(GetIndexOptions::update_only(names)).await
    }

    async fn fresh_in_memory(&self) -> Option<Arc<CapabilityIndex>> {
        if self.store.is_stale().await {
            return None;
        }
        self.cache.get().await
    }

    /// Memory, then file, then an empty index.
    async fn last_known(&self) -> Arc<CapabilityIndex> {
        if let Some(index) = self.cache.get().await {
            return index;
        }
        match self.store.load().await {
            LoadOutcome::Loaded(index) => {
                let index = Arc::new(*index);
                self.cache.put(index.clone()).await;
                index
            }
            _ => Arc::new(CapabilityIndex::new()),
        }
    }

    /// Prior state for carry-forward: memory first, then file.
    async fn snapshot(&self) -> Option<Arc<CapabilityIndex>> {
        if let Some(index) = self.cache.get().await {
            return Some(index);
        }
        match self.store.load().await {
            LoadOutcome::Loaded(index) => Some(Arc::new(*index)),
            _ => None,
        }
    }

    /// Caller must hold the build gate.
    async fn rebuild(&self, options: &GetIndexOptions) -> QuiverResult<Arc<CapabilityIndex>> {
        let lock = match self
            .store
            .acquire_build_lock(
                self.config.store.lock_timeout(),
                self.config.store.lock_stale_after(),
            )
            .await
        {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                warn!(
                    path = %self.store.path().display(),
                    "Build lock held elsewhere, skipping rebuild"
                );
                return Ok(self.last_known().await);
            }
            Err(e) => {
                warn!(error = %e, "Could not take build lock, skipping rebuild");
                return Ok(self.last_known().await);
            }
        };

        let result = self.rebuild_locked(options).await;
        if let Err(e) = lock.release().await {
            warn!(error = %e, "Failed to release build lock");
        }
        result
    }

    async fn rebuild_locked(
        &self,
        options: &GetIndexOptions,
    ) -> QuiverResult<Arc<CapabilityIndex>> {
        let started = Instant::now();
        info!(
            force = options.force_rebuild,
            partial = options.update_only.is_some(),
            "Rebuilding capability index"
        );

        let prior = self.snapshot().await;
        let preserve_custom = options.preserve_custom || options.update_only.is_some();
        let filter: Option<HashSet<&str>> = options
            .update_only
            .as_ref()
            .map(|names| names.iter().map(|n| n.trim()).collect());

        let listing = self.catalog.list_entries().await?;

        let mut index = CapabilityIndex::new();
        if let Some(prior) = &prior {
            index.metadata.created = prior.metadata.created;
            index.metadata.extra = prior.metadata.extra.clone();
            index.extensions = prior.extensions.clone();
            index.extra = prior.extra.clone();
        }

        let (mut built, mut carried_forward, mut skipped, mut truncated_triggers) = (0, 0, 0, 0);
        for (element_type, entries) in &listing {
            for entry in entries {
                let Some(name) = entry.usable_name() else {
                    warn!(element_type = %element_type, "Skipping catalog entry without a name");
                    skipped += 1;
                    continue;
                };
                let id = ElementId::new(element_type.as_str(), name);
                let prior_def = prior.as_deref().and_then(|p| p.get(&id));

                let excluded = filter
                    .as_ref()
                    .is_some_and(|f| !f.contains(name) && !f.contains(id.to_string().as_str()));

                let definition = match prior_def {
                    Some(prior_def) if excluded => {
                        carried_forward += 1;
                        prior_def.clone()
                    }
                    _ => {
                        match self
                            .builder
                            .build(element_type, entry, prior_def, preserve_custom)
                        {
                            Some(definition) => {
                                built += 1;
                                definition
                            }
                            None => {
                                skipped += 1;
                                continue;
                            }
                        }
                    }
                };

                let extracted = self
                    .extractor
                    .extract_into(&definition, &mut index.action_triggers);
                if extracted.truncated {
                    truncated_triggers += 1;
                }
                index
                    .elements
                    .entry(element_type.clone())
                    .or_default()
                    .insert(definition.core.name.clone(), definition);
            }
        }

        let sampling = self.sampler.calculate(&mut index.elements).await;
        let pruned_edges = index.prune_dangling_relationships();
        if pruned_edges > 0 {
            debug!(pruned_edges, "Removed edges to elements no longer in the catalog");
        }
        index.touch();

        self.store.save(&index).await?;

        let report = BuildReport {
            built,
            carried_forward,
            skipped,
            truncated_triggers,
            pruned_edges,
            sampling,
            duration_ms: started.elapsed().as_millis() as u64,
            finished_at: Utc::now(),
        };
        info!(
            elements = index.metadata.total_elements,
            built = report.built,
            carried_forward = report.carried_forward,
            skipped = report.skipped,
            triggers = index.action_triggers.len(),
            duration_ms = report.duration_ms,
            "Capability index rebuilt"
        );

        let index = Arc::new(index);
        self.cache.put(index.clone()).await;
        *self.last_report.write().await = Some(report);
        Ok(index)
    }

    fn cleanup_targets(&self) -> CleanupTargets {
        let max_age = self
            .config
            .store
            .ttl()
            .mul_f64(self.config.guardian.stale_multiplier);
        CleanupTargets::new(
            self.cache.clone(),
            self.similarity.clone(),
            self.graph.clone(),
            max_age,
        )
    }

    /// Start the periodic memory guardian. Returns false if already running.
    pub async fn start_background_cleanup(&self) -> QuiverResult<bool> {
        let mut slot = self.guardian.lock().await;
        if slot.is_some() {
            return Ok(false);
        }
        let guardian =
            MemoryGuardian::start(self.cleanup_targets(), self.config.guardian.cleanup_interval())
                .await?;
        *slot = Some(guardian);
        Ok(true)
    }

    /// Stop the periodic memory guardian. Returns false if it was not running.
    pub async fn stop_background_cleanup(&self) -> QuiverResult<bool> {
        let guardian = self.guardian.lock().await.take();
        match guardian {
            Some(guardian) => {
                guardian.stop().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn is_background_cleanup_running(&self) -> bool {
        self.guardian.lock().await.is_some()
    }

    /// Run one guardian sweep now.
    pub async fn run_cleanup_now(&self) -> crate::guardian::SweepReport {
        self.cleanup_targets().sweep().await
    }
}
