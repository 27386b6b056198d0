//! Query and mutation surface of the engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

use crate::error::{QuiverError, QuiverResult};
use crate::store::BuildLock;
use crate::traits::{
    ConnectedElement, ConnectedOptions, ElementPath, GraphOperations, PathOptions,
    RelationshipStats,
};
use crate::types::{CapabilityIndex, ElementId, Relationship};

use super::{CapabilityIndexEngine, ElementMatch, GetIndexOptions, IndexStats, SearchCriteria};

const VERB_SCORE: u32 = 2;
const KEYWORD_SCORE: u32 = 1;

/// An in-progress edit: holds the gate and the build lock, and a working
/// copy of the index.
struct Mutation<'a> {
    _gate: MutexGuard<'a, ()>,
    lock: BuildLock,
    index: CapabilityIndex,
}

impl CapabilityIndexEngine {
    /// Element names registered for an action verb.
    pub async fn elements_for_action(&self, verb: &str) -> QuiverResult<Vec<String>> {
        let Some(verb) = self.extractor.normalize(verb) else {
            return Ok(Vec::new());
        };
        let index = self.get_index(GetIndexOptions::default()).await?;
        Ok(index.elements_for_verb(&verb).to_vec())
    }

    /// Rank elements by verb and keyword matches.
    ///
    /// With no verbs or keywords, every element passing the type and
    /// relationship filters is returned with score 0.
    pub async fn search(&self, criteria: &SearchCriteria) -> QuiverResult<Vec<ElementMatch>> {
        let index = self.get_index(GetIndexOptions::default()).await?;

        let verbs: Vec<String> = criteria
            .verbs
            .iter()
            .filter_map(|v| self.extractor.normalize(v))
            .collect();
        let keywords: Vec<String> = criteria
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let mut matches = Vec::new();
        for def in index.iter_elements() {
            if criteria
                .element_type
                .as_deref()
                .is_some_and(|t| t != def.core.element_type)
            {
                continue;
            }
            if criteria
                .has_relationships
                .is_some_and(|wanted| wanted != def.has_relationships())
            {
                continue;
            }

            let mut score = 0;
            let mut matched = Vec::new();
            for verb in &verbs {
                if index
                    .elements_for_verb(verb)
                    .iter()
                    .any(|name| *name == def.core.name)
                {
                    score += VERB_SCORE;
                    matched.push(format!("verb:{verb}"));
                }
            }
            for keyword in &keywords {
                let hit = def
                    .search
                    .keywords
                    .iter()
                    .chain(def.search.tags.iter())
                    .any(|k| k.to_lowercase() == *keyword);
                if hit {
                    score += KEYWORD_SCORE;
                    matched.push(format!("keyword:{keyword}"));
                }
            }

            if criteria.has_terms() && score == 0 {
                continue;
            }
            matches.push(ElementMatch {
                identity: def.identity(),
                element_type: def.core.element_type.clone(),
                name: def.core.name.clone(),
                score,
                matched,
            });
        }

        matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.identity.cmp(&b.identity)));
        if let Some(limit) = criteria.limit {
            matches.truncate(limit);
        }
        debug!(results = matches.len(), "Search complete");
        Ok(matches)
    }

    /// All relationships of one element, by kind.
    pub async fn relationships_for(
        &self,
        identity: &str,
    ) -> QuiverResult<BTreeMap<String, Vec<Relationship>>> {
        let id = ElementId::parse(identity)?;
        let index = self.get_index(GetIndexOptions::default()).await?;
        index
            .get(&id)
            .map(|def| def.relationships.clone())
            .ok_or_else(|| QuiverError::not_found(id.to_string()))
    }

    /// Add a directed edge `from -> to` under `kind`. Returns false when an
    /// edge to `to` already exists in that kind.
    pub async fn add_relationship(
        &self,
        from: &str,
        to: &str,
        kind: &str,
        mut relationship: Relationship,
    ) -> QuiverResult<bool> {
        let from = ElementId::parse(from)?;
        let to = ElementId::parse(to)?;
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(QuiverError::validation("relationship kind must not be empty"));
        }
        relationship.element = to.to_string();

        let mut mutation = self.begin_mutation("add_relationship").await?;
        let outcome = insert_edge(&mut mutation.index, &from, &to, kind, relationship);

        match outcome {
            Ok(true) => {
                self.finish_mutation(mutation, Ok(())).await?;
                info!(from = %from, to = %to, kind, "Relationship added");
                Ok(true)
            }
            Ok(false) => {
                self.abort_mutation(mutation).await;
                Ok(false)
            }
            Err(e) => {
                self.abort_mutation(mutation).await;
                Err(e)
            }
        }
    }

    /// Store a caller-owned blob under `extensions.<name>`, replacing any
    /// previous value.
    pub async fn add_extension(&self, name: &str, value: serde_yaml::Value) -> QuiverResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(QuiverError::validation("extension name must not be empty"));
        }
        let mut mutation = self.begin_mutation("add_extension").await?;
        mutation.index.extensions.insert(name.to_string(), value);
        self.finish_mutation(mutation, Ok(())).await?;
        Ok(())
    }

    /// Set one key of an element's `custom` mapping.
    pub async fn set_custom_field(
        &self,
        identity: &str,
        key: &str,
        value: serde_yaml::Value,
    ) -> QuiverResult<()> {
        let id = ElementId::parse(identity)?;
        let mut mutation = self.begin_mutation("set_custom_field").await?;
        let outcome = match mutation.index.get_mut(&id) {
            None => Err(QuiverError::not_found(id.to_string())),
            Some(def) => {
                let custom = def
                    .custom
                    .get_or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
                match custom.as_mapping_mut() {
                    Some(map) => {
                        map.insert(serde_yaml::Value::String(key.to_string()), value);
                        Ok(())
                    }
                    None => Err(QuiverError::validation(format!(
                        "custom data of '{id}' is not a mapping"
                    ))),
                }
            }
        };
        self.finish_mutation(mutation, outcome).await?;
        Ok(())
    }

    /// Run the graph collaborator's relationship discovery and persist the
    /// result. Returns the number of edges added.
    pub async fn discover_relationships(&self) -> QuiverResult<usize> {
        let graph = self.graph()?.clone();
        let mut mutation = self.begin_mutation("discover_relationships").await?;
        match graph.discover_relationships(&mut mutation.index).await {
            Ok(0) => {
                self.abort_mutation(mutation).await;
                Ok(0)
            }
            Ok(added) => {
                self.finish_mutation(mutation, Ok(())).await?;
                info!(added, "Discovered relationships");
                Ok(added)
            }
            Err(e) => {
                self.abort_mutation(mutation).await;
                Err(e)
            }
        }
    }

    pub async fn find_path(
        &self,
        from: &str,
        to: &str,
        options: &PathOptions,
    ) -> QuiverResult<Option<ElementPath>> {
        let graph = self.graph()?;
        let from = ElementId::parse(from)?;
        let to = ElementId::parse(to)?;
        let index = self.get_index(GetIndexOptions::default()).await?;
        graph.find_path(&index, &from, &to, options).await
    }

    pub async fn connected_elements(
        &self,
        identity: &str,
        options: &ConnectedOptions,
    ) -> QuiverResult<Vec<ConnectedElement>> {
        let graph = self.graph()?;
        let id = ElementId::parse(identity)?;
        let index = self.get_index(GetIndexOptions::default()).await?;
        graph.connected_elements(&index, &id, options).await
    }

    pub async fn relationship_stats(&self) -> QuiverResult<RelationshipStats> {
        let graph = self.graph()?;
        let index = self.get_index(GetIndexOptions::default()).await?;
        graph.relationship_stats(&index).await
    }

    /// Drop the in-memory index and collaborator caches. Returns whether an
    /// index copy was held.
    pub async fn clear_memory_cache(&self) -> bool {
        self.similarity.clear_cache();
        if let Some(graph) = &self.graph {
            graph.clear_cache();
        }
        let cleared = self.cache.clear().await;
        info!(cleared, "Memory cache cleared");
        cleared
    }

    /// Element, trigger, and relationship counts plus the last build report.
    pub async fn index_stats(&self) -> QuiverResult<IndexStats> {
        let index = self.get_index(GetIndexOptions::default()).await?;
        Ok(IndexStats {
            total_elements: index.element_count(),
            elements_by_type: index
                .elements
                .iter()
                .map(|(t, bucket)| (t.clone(), bucket.len()))
                .collect(),
            trigger_count: index.action_triggers.len(),
            relationship_count: index.relationship_count(),
            extension_count: index.extensions.len(),
            last_updated: index.metadata.last_updated,
            last_build: self.last_report.read().await.clone(),
        })
    }

    /// Age of the in-memory index copy, if one is held.
    pub async fn memory_index_age(&self) -> Option<std::time::Duration> {
        self.cache.age().await
    }

    fn graph(&self) -> QuiverResult<&Arc<dyn GraphOperations>> {
        self.graph.as_ref().ok_or_else(QuiverError::graph_not_configured)
    }

    async fn begin_mutation(&self, operation: &str) -> QuiverResult<Mutation<'_>> {
        let current = self.get_index(GetIndexOptions::default()).await?;
        let gate = self.build_gate.lock().await;
        let lock = self
            .store
            .acquire_build_lock(
                self.config.store.lock_timeout(),
                self.config.store.lock_stale_after(),
            )
            .await?
            .ok_or_else(|| {
                QuiverError::lock(format!("{operation}: build lock held by another process"))
            })?;

        // A rebuild may have landed between get_index and the gate.
        let base = self.cache.get().await.unwrap_or(current);
        Ok(Mutation {
            _gate: gate,
            lock,
            index: (*base).clone(),
        })
    }

    /// Persist the working copy if `outcome` is Ok, then release the lock.
    /// Memory is only updated after a successful write.
    async fn finish_mutation(
        &self,
        mutation: Mutation<'_>,
        outcome: QuiverResult<()>,
    ) -> QuiverResult<Arc<CapabilityIndex>> {
        let Mutation {
            _gate,
            lock,
            mut index,
        } = mutation;

        let result = match outcome {
            Ok(()) => {
                index.touch();
                match self.store.save(&index).await {
                    Ok(()) => {
                        let index = Arc::new(index);
                        self.cache.put(index.clone()).await;
                        Ok(index)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = lock.release().await {
            warn!(error = %e, "Failed to release build lock");
        }
        result
    }

    async fn abort_mutation(&self, mutation: Mutation<'_>) {
        if let Err(e) = mutation.lock.release().await {
            warn!(error = %e, "Failed to release build lock");
        }
    }
}

fn insert_edge(
    index: &mut CapabilityIndex,
    from: &ElementId,
    to: &ElementId,
    kind: &str,
    relationship: Relationship,
) -> QuiverResult<bool> {
    if !index.contains(to) {
        return Err(QuiverError::not_found(to.to_string()));
    }
    let def = index
        .get_mut(from)
        .ok_or_else(|| QuiverError::not_found(from.to_string()))?;
    Ok(def.add_relationship(kind, relationship))
}
