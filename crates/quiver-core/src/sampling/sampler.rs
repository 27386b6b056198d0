//! Relationship sampler.
//!
//! Small corpora get every pair compared. Larger ones get a keyword-cluster
//! pass followed by a cross-type pass, both drawing on one comparison
//! budget. Either way a wall-clock breaker can cut the run short, leaving
//! whatever edges were found so far.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SamplingConfig;
use crate::traits::{Relevance, TextSimilarity};
use crate::types::{ElementMap, Relationship, SemanticInfo, SEMANTIC_SIMILARITY, SIMILAR_KIND};

use super::budget::{CircuitBreaker, ComparisonBudget};
use super::clusters::keyword_clusters;

/// Strategy chosen for one calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Every unordered pair compared once.
    FullMatrix,
    /// Cluster and cross-type passes under a comparison budget.
    Sampled,
    /// Fewer than two elements.
    Skipped,
}

impl std::fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplingStrategy::FullMatrix => write!(f, "full_matrix"),
            SamplingStrategy::Sampled => write!(f, "sampled"),
            SamplingStrategy::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of one relationship calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingReport {
    pub strategy: SamplingStrategy,
    pub element_count: usize,
    /// Relevance calls performed.
    pub comparisons: usize,
    /// Directed edges inserted.
    pub edges_created: usize,
    /// The circuit breaker stopped the run early.
    pub timed_out: bool,
    /// The comparison budget ran out (sampled mode only).
    pub budget_exhausted: bool,
    pub duration_ms: u64,
}

struct Node {
    element_type: String,
    name: String,
    identity: String,
    text: String,
    entropy: f64,
    cluster_terms: Vec<String>,
}

/// Computes `similar` edges between element definitions.
pub struct RelationshipSampler {
    similarity: Arc<dyn TextSimilarity>,
    config: SamplingConfig,
}

impl RelationshipSampler {
    pub fn new(similarity: Arc<dyn TextSimilarity>, config: SamplingConfig) -> Self {
        Self { similarity, config }
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Refresh per-element entropy and add similarity edges in place.
    pub async fn calculate(&self, elements: &mut ElementMap) -> SamplingReport {
        let breaker = CircuitBreaker::start(self.config.circuit_breaker());
        let nodes = self.prepare(elements);
        let element_count = nodes.len();

        let strategy = if element_count < 2 {
            SamplingStrategy::Skipped
        } else if element_count <= self.config.effective_max_full_matrix() {
            SamplingStrategy::FullMatrix
        } else {
            SamplingStrategy::Sampled
        };

        debug!(element_count, %strategy, "Calculating relationships");

        let mut pass = Pass {
            similarity: self.similarity.as_ref(),
            threshold: self.config.similarity_threshold,
            batch_size: self.config.batch_size.max(1),
            elements,
            nodes: &nodes,
            breaker,
            compared: HashSet::new(),
            comparisons: 0,
            edges_created: 0,
            timed_out: false,
        };

        let budget_exhausted = match strategy {
            SamplingStrategy::Skipped => false,
            SamplingStrategy::FullMatrix => {
                self.full_matrix(&mut pass).await;
                false
            }
            SamplingStrategy::Sampled => self.sampled(&mut pass).await,
        };

        let report = SamplingReport {
            strategy,
            element_count,
            comparisons: pass.comparisons,
            edges_created: pass.edges_created,
            timed_out: pass.timed_out,
            budget_exhausted,
            duration_ms: breaker.elapsed().as_millis() as u64,
        };

        info!(
            strategy = %report.strategy,
            elements = report.element_count,
            comparisons = report.comparisons,
            edges = report.edges_created,
            timed_out = report.timed_out,
            duration_ms = report.duration_ms,
            "Relationship calculation complete"
        );
        report
    }

    fn prepare(&self, elements: &mut ElementMap) -> Vec<Node> {
        let mut nodes = Vec::new();
        for (element_type, bucket) in elements.iter_mut() {
            for (name, def) in bucket.iter_mut() {
                let text = def.similarity_text();
                let entropy = self.similarity.entropy(&text);
                let semantic = def.semantic.get_or_insert_with(SemanticInfo::default);
                semantic.entropy = entropy;
                semantic.unique_terms = self.similarity.unique_terms(&text);

                nodes.push(Node {
                    element_type: element_type.clone(),
                    name: name.clone(),
                    identity: def.identity(),
                    text,
                    entropy,
                    cluster_terms: def
                        .search
                        .keywords
                        .iter()
                        .chain(def.search.tags.iter())
                        .cloned()
                        .collect(),
                });
            }
        }
        nodes
    }

    async fn full_matrix(&self, pass: &mut Pass<'_>) {
        let n = pass.nodes.len();
        'outer: for a in 0..n {
            for b in (a + 1)..n {
                if pass.should_stop() {
                    break 'outer;
                }
                pass.compare(a, b).await;
            }
        }
    }

    /// Returns whether the comparison budget ran out.
    async fn sampled(&self, pass: &mut Pass<'_>) -> bool {
        let nodes = pass.nodes;
        let n = nodes.len();
        let max = self.config.effective_max_comparisons();
        let cluster_budget =
            ((max as f64) * self.config.cluster_budget_ratio.clamp(0.0, 1.0)).floor() as usize;
        let sample_cap = self.config.cluster_sample_cap.max(1);
        let mut budget = ComparisonBudget::new(max);
        let mut rng = self.rng();

        // Cluster pass
        let terms: Vec<Vec<String>> = nodes.iter().map(|n| n.cluster_terms.clone()).collect();
        let clusters = keyword_clusters(&terms);
        debug!(clusters = clusters.len(), cluster_budget, "Starting cluster pass");

        'clusters: for members in clusters.values() {
            for &a in members {
                let others: Vec<usize> = members.iter().copied().filter(|&m| m != a).collect();
                let k = ((others.len() as f64).sqrt().ceil() as usize)
                    .clamp(1, sample_cap)
                    .min(others.len());
                let picks: Vec<usize> = others.choose_multiple(&mut rng, k).copied().collect();

                for b in picks {
                    if pass.already_compared(a, b) {
                        continue;
                    }
                    if budget.used() >= cluster_budget || pass.should_stop() {
                        break 'clusters;
                    }
                    budget.try_consume();
                    pass.compare(a, b).await;
                }
            }
        }

        if pass.timed_out {
            return budget.is_exhausted();
        }

        // Cross-type pass
        let mut by_type: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, node) in nodes.iter().enumerate() {
            by_type.entry(node.element_type.as_str()).or_default().push(idx);
        }

        if budget.is_exhausted() {
            warn!(
                max_comparisons = max,
                "Comparison budget exhausted by cluster pass, skipping cross-type pass"
            );
            return true;
        }
        if by_type.len() < 2 {
            debug!("Single element type, skipping cross-type pass");
            return false;
        }

        let remaining = budget.remaining();
        let k = ((n as f64).sqrt().ceil() as usize).min(remaining / by_type.len());
        if k == 0 {
            return budget.is_exhausted();
        }
        let all: Vec<usize> = (0..n).collect();
        let sampled: Vec<usize> = all.choose_multiple(&mut rng, k).copied().collect();
        let per_identity = remaining / k;
        debug!(sampled = k, per_identity, "Starting cross-type pass");

        'cross: for a in sampled {
            let own_type = nodes[a].element_type.as_str();
            for (element_type, members) in &by_type {
                if *element_type == own_type {
                    continue;
                }
                let share = per_identity as f64 * members.len() as f64 / n as f64;
                let size = (share.round() as usize).max(1).min(members.len());
                let picks: Vec<usize> = members.choose_multiple(&mut rng, size).copied().collect();

                for b in picks {
                    if pass.already_compared(a, b) {
                        continue;
                    }
                    if pass.should_stop() || !budget.try_consume() {
                        break 'cross;
                    }
                    pass.compare(a, b).await;
                }
            }
        }

        if budget.is_exhausted() {
            warn!(max_comparisons = max, "Comparison budget exhausted");
        }
        budget.is_exhausted()
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Mutable state of one calculation.
struct Pass<'a> {
    similarity: &'a dyn TextSimilarity,
    threshold: f64,
    batch_size: usize,
    elements: &'a mut ElementMap,
    nodes: &'a [Node],
    breaker: CircuitBreaker,
    compared: HashSet<(usize, usize)>,
    comparisons: usize,
    edges_created: usize,
    timed_out: bool,
}

impl Pass<'_> {
    fn already_compared(&self, a: usize, b: usize) -> bool {
        self.compared.contains(&(a.min(b), a.max(b)))
    }

    fn should_stop(&mut self) -> bool {
        if self.timed_out {
            return true;
        }
        if self.breaker.tripped() {
            self.timed_out = true;
            warn!(
                elapsed_ms = self.breaker.elapsed().as_millis() as u64,
                comparisons = self.comparisons,
                edges = self.edges_created,
                "Relationship circuit breaker tripped, keeping partial results"
            );
        }
        self.timed_out
    }

    async fn compare(&mut self, a: usize, b: usize) {
        self.compared.insert((a.min(b), a.max(b)));
        let relevance = self
            .similarity
            .relevance(&self.nodes[a].text, &self.nodes[b].text);
        self.comparisons += 1;

        if relevance.combined_score > self.threshold {
            self.link(a, b, relevance);
        }
        if self.comparisons % self.batch_size == 0 {
            tokio::task::yield_now().await;
        }
    }

    /// Insert the mirrored pair. Existing edges to the same target win.
    fn link(&mut self, a: usize, b: usize, relevance: Relevance) {
        let nodes = self.nodes;
        let strength = relevance.combined_score.clamp(0.0, 1.0);
        let entropy_delta = (nodes[a].entropy - nodes[b].entropy).abs();

        for (from, to) in [(a, b), (b, a)] {
            let Some(def) = self
                .elements
                .get_mut(&nodes[from].element_type)
                .and_then(|bucket| bucket.get_mut(&nodes[from].name))
            else {
                continue;
            };

            let edge = Relationship::new(nodes[to].identity.clone(), SEMANTIC_SIMILARITY, strength)
                .with_metadata("jaccard", relevance.jaccard)
                .with_metadata("entropy_delta", entropy_delta);
            if def.add_relationship(SIMILAR_KIND, edge) {
                self.edges_created += 1;
            }
            def.semantic
                .get_or_insert_with(SemanticInfo::default)
                .similarities
                .entry(nodes[to].identity.clone())
                .or_insert(relevance.jaccard);
        }
    }
}
