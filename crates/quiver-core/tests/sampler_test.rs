//! Integration tests for the relationship sampler.
//!
//! Covers the comparison budget and its split between the cluster and
//! cross-type passes, edge symmetry over random corpora, and the circuit
//! breaker.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use quiver_core::sampling::{RelationshipSampler, SamplingStrategy};
use quiver_core::types::{
    ElementCore, ElementDefinition, ElementMap, ExtraFields, SearchHints, SIMILAR_KIND,
};
use quiver_core::{Relevance, SamplingConfig, TermSimilarity, TextSimilarity};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const VOCABULARY: &[&str] = &[
    "debug", "code", "review", "write", "story", "test", "deploy", "cloud", "design", "plan",
    "data", "query", "report", "chart", "email", "draft", "legal", "audit", "music", "game",
];

/// Counts relevance calls and links everything.
#[derive(Default)]
struct CountingSimilarity {
    calls: AtomicUsize,
}

impl TextSimilarity for CountingSimilarity {
    fn entropy(&self, _text: &str) -> f64 {
        1.0
    }

    fn relevance(&self, _a: &str, _b: &str) -> Relevance {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Relevance {
            jaccard: 0.5,
            combined_score: 0.9,
        }
    }
}

/// Sleeps on every comparison.
struct SlowSimilarity(Duration);

impl TextSimilarity for SlowSimilarity {
    fn entropy(&self, _text: &str) -> f64 {
        0.0
    }

    fn relevance(&self, _a: &str, _b: &str) -> Relevance {
        std::thread::sleep(self.0);
        Relevance {
            jaccard: 1.0,
            combined_score: 1.0,
        }
    }
}

/// Records every compared pair by element name, in call order.
#[derive(Default)]
struct RecordingSimilarity {
    pairs: Mutex<Vec<(String, String)>>,
}

impl RecordingSimilarity {
    fn pairs(&self) -> Vec<(String, String)> {
        self.pairs.lock().unwrap().clone()
    }
}

impl TextSimilarity for RecordingSimilarity {
    fn entropy(&self, _text: &str) -> f64 {
        0.0
    }

    fn relevance(&self, a: &str, b: &str) -> Relevance {
        let name = |text: &str| text.split_whitespace().next().unwrap_or_default().to_string();
        self.pairs.lock().unwrap().push((name(a), name(b)));
        Relevance {
            jaccard: 0.0,
            combined_score: 0.0,
        }
    }
}

/// Element type encoded in names like `skills-7`.
fn type_of(name: &str) -> &str {
    name.split('-').next().unwrap_or_default()
}

fn definition(
    element_type: &str,
    name: &str,
    description: &str,
    keywords: Vec<String>,
) -> ElementDefinition {
    ElementDefinition {
        core: ElementCore {
            name: name.to_string(),
            element_type: element_type.to_string(),
            version: None,
            description: Some(description.to_string()),
            created: None,
            updated: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            extra: ExtraFields::new(),
        },
        search: SearchHints {
            keywords,
            ..SearchHints::default()
        },
        actions: None,
        relationships: BTreeMap::new(),
        semantic: None,
        custom: None,
        extra: ExtraFields::new(),
    }
}

fn random_corpus(rng: &mut StdRng, size: usize) -> ElementMap {
    let types = ["personas", "skills", "templates", "agents"];
    let mut elements = ElementMap::new();
    for i in 0..size {
        let element_type = types[rng.gen_range(0..types.len())];
        let words: Vec<&str> = VOCABULARY.choose_multiple(rng, 4).copied().collect();
        let keywords = words[..2].iter().map(|w| w.to_string()).collect();
        let def = definition(element_type, &format!("element {i}"), &words.join(" "), keywords);
        elements
            .entry(element_type.to_string())
            .or_default()
            .insert(def.core.name.clone(), def);
    }
    elements
}

/// `per_type` elements named `<type>-<i>` for each type. With `groups`,
/// element `i` gets keyword `<type>-group-<i % groups>`, so every keyword
/// cluster stays inside one type.
fn typed_corpus(types: &[(&str, usize)], groups: Option<usize>) -> ElementMap {
    let mut elements = ElementMap::new();
    for (element_type, count) in types {
        for i in 0..*count {
            let keywords = groups
                .map(|g| vec![format!("{element_type}-group-{}", i % g)])
                .unwrap_or_default();
            let def = definition(element_type, &format!("{element_type}-{i}"), "", keywords);
            elements
                .entry(element_type.to_string())
                .or_default()
                .insert(def.core.name.clone(), def);
        }
    }
    elements
}

fn assert_edges_mirrored(elements: &ElementMap) {
    let lookup: BTreeMap<String, &ElementDefinition> = elements
        .values()
        .flat_map(|bucket| bucket.values())
        .map(|def| (def.identity(), def))
        .collect();

    for (identity, def) in &lookup {
        let edges = def.relationships_of(SIMILAR_KIND);
        let mut targets: Vec<&str> = edges.iter().map(|e| e.element.as_str()).collect();
        targets.sort();
        targets.dedup();
        assert_eq!(targets.len(), edges.len(), "duplicate edge on {identity}");

        for edge in edges {
            assert_ne!(&edge.element, identity, "self edge on {identity}");
            let peer = lookup[&edge.element];
            let back = peer
                .relationships_of(SIMILAR_KIND)
                .iter()
                .find(|e| &e.element == identity)
                .unwrap_or_else(|| panic!("{} -> {identity} missing", edge.element));
            assert_eq!(back.strength, edge.strength);
        }
    }
}

/// The sampled strategy never exceeds the comparison budget.
#[tokio::test]
async fn test_sampled_respects_comparison_budget() {
    for (size, seed) in [(25, 1u64), (60, 2), (120, 3), (200, 4)] {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut elements = random_corpus(&mut rng, size);
        let similarity = Arc::new(CountingSimilarity::default());
        let config = SamplingConfig {
            max_full_matrix: 10,
            max_comparisons: 50,
            seed: Some(seed),
            ..SamplingConfig::default()
        };

        let report = RelationshipSampler::new(similarity.clone(), config)
            .calculate(&mut elements)
            .await;

        assert_eq!(report.strategy, SamplingStrategy::Sampled);
        assert_eq!(report.element_count, size);
        assert!(report.comparisons <= 50, "{size} elements: {}", report.comparisons);
        assert_eq!(similarity.calls.load(Ordering::SeqCst), report.comparisons);
        assert!(!report.timed_out);
    }
}

/// The configured budget is capped by the hard ceiling.
#[tokio::test]
async fn test_hard_comparison_ceiling() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut elements = random_corpus(&mut rng, 300);
    let similarity = Arc::new(CountingSimilarity::default());
    let config = SamplingConfig {
        max_full_matrix: 1_000,
        max_comparisons: 1_000_000,
        seed: Some(11),
        ..SamplingConfig::default()
    };

    let report = RelationshipSampler::new(similarity, config)
        .calculate(&mut elements)
        .await;

    assert_eq!(report.strategy, SamplingStrategy::Sampled);
    assert!(report.comparisons <= quiver_core::config::HARD_MAX_COMPARISONS);
}

/// Every edge has a mirror with the same strength, for both strategies.
#[tokio::test]
async fn test_edges_are_mirrored_on_random_corpora() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let size = if seed % 2 == 0 { 15 } else { 80 };
        let mut elements = random_corpus(&mut rng, size);
        let config = SamplingConfig {
            similarity_threshold: 0.2,
            seed: Some(seed),
            ..SamplingConfig::default()
        };

        let report = RelationshipSampler::new(Arc::new(TermSimilarity::new()), config)
            .calculate(&mut elements)
            .await;

        assert_eq!(report.edges_created % 2, 0);
        assert_edges_mirrored(&elements);
        for def in elements.values().flat_map(|bucket| bucket.values()) {
            assert!(def.semantic.is_some());
        }
    }
}

/// Same seed, same edges.
#[tokio::test]
async fn test_seeded_sampling_is_reproducible() {
    let run = |seed: u64| async move {
        let mut rng = StdRng::seed_from_u64(42);
        let mut elements = random_corpus(&mut rng, 60);
        let config = SamplingConfig {
            max_full_matrix: 10,
            max_comparisons: 80,
            similarity_threshold: 0.2,
            seed: Some(seed),
            ..SamplingConfig::default()
        };
        RelationshipSampler::new(Arc::new(TermSimilarity::new()), config)
            .calculate(&mut elements)
            .await;
        elements
    };

    assert_eq!(run(9).await, run(9).await);
}

/// A tripped breaker ends the run early with valid partial results.
#[tokio::test]
async fn test_circuit_breaker_returns_partial_results() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut elements = random_corpus(&mut rng, 12);
    let config = SamplingConfig {
        circuit_breaker_ms: 20,
        ..SamplingConfig::default()
    };

    let report = RelationshipSampler::new(
        Arc::new(SlowSimilarity(Duration::from_millis(5))),
        config,
    )
    .calculate(&mut elements)
    .await;

    assert_eq!(report.strategy, SamplingStrategy::FullMatrix);
    assert!(report.timed_out);
    assert!(report.comparisons > 0);
    assert!(report.comparisons < 12 * 11 / 2);
    assert_eq!(report.edges_created, report.comparisons * 2);
    assert_edges_mirrored(&elements);
}

/// The cluster pass stops at its share of the budget and the cross-type
/// pass spends the rest.
#[tokio::test]
async fn test_cluster_pass_stops_at_its_share() {
    let mut elements = typed_corpus(&[("skills", 30), ("personas", 30)], Some(3));
    let similarity = Arc::new(RecordingSimilarity::default());
    let config = SamplingConfig {
        max_full_matrix: 10,
        max_comparisons: 50,
        cluster_budget_ratio: 0.6,
        seed: Some(3),
        ..SamplingConfig::default()
    };

    let report = RelationshipSampler::new(similarity.clone(), config)
        .calculate(&mut elements)
        .await;

    let pairs = similarity.pairs();
    let same_type = pairs.iter().filter(|(a, b)| type_of(a) == type_of(b)).count();
    let cross_type = pairs.len() - same_type;

    assert_eq!(report.strategy, SamplingStrategy::Sampled);
    assert_eq!(report.comparisons, pairs.len());
    assert_eq!(same_type, 30);
    assert!(cross_type > 0);
    assert!(cross_type <= 20);
    assert!(!report.budget_exhausted);
}

/// A cluster pass allowed the whole budget leaves nothing for the
/// cross-type pass.
#[tokio::test]
async fn test_exhausted_cluster_pass_skips_cross_type() {
    let mut elements = typed_corpus(&[("skills", 30), ("personas", 30)], Some(3));
    let similarity = Arc::new(RecordingSimilarity::default());
    let config = SamplingConfig {
        max_full_matrix: 10,
        max_comparisons: 50,
        cluster_budget_ratio: 1.0,
        seed: Some(4),
        ..SamplingConfig::default()
    };

    let report = RelationshipSampler::new(similarity.clone(), config)
        .calculate(&mut elements)
        .await;

    let pairs = similarity.pairs();
    assert_eq!(report.comparisons, 50);
    assert!(report.budget_exhausted);
    assert!(pairs.iter().all(|(a, b)| type_of(a) == type_of(b)));
}

/// Cross-type samples follow each type's share of the corpus, and even a
/// single-element type is compared at least once.
#[tokio::test]
async fn test_cross_type_samples_follow_type_share() {
    let mut elements = typed_corpus(&[("skills", 40), ("personas", 16), ("agents", 1)], None);
    let similarity = Arc::new(RecordingSimilarity::default());
    let config = SamplingConfig {
        max_full_matrix: 10,
        max_comparisons: 400,
        cluster_budget_ratio: 0.0,
        seed: Some(8),
        ..SamplingConfig::default()
    };

    let report = RelationshipSampler::new(similarity.clone(), config)
        .calculate(&mut elements)
        .await;
    assert_eq!(report.strategy, SamplingStrategy::Sampled);

    // 57 elements: 8 sampled identities, 50 comparisons each, split by share
    let expected = BTreeMap::from([("skills", 35usize), ("personas", 14), ("agents", 1)]);
    let pairs = similarity.pairs();
    let mut per_source: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    for (a, b) in &pairs {
        assert_ne!(type_of(a), type_of(b));
        *per_source
            .entry(a.as_str())
            .or_default()
            .entry(type_of(b))
            .or_insert(0) += 1;
    }
    assert!(!per_source.is_empty() && per_source.len() <= 8);

    for (source, counts) in &per_source {
        for (element_type, &want) in &expected {
            let got = counts.get(element_type).copied().unwrap_or(0);
            if *element_type == type_of(source) {
                assert_eq!(got, 0);
                continue;
            }
            // Pairs an earlier sampled identity already compared are skipped
            assert!(got <= want, "{source} -> {element_type}: {got}");
            assert!(got + 7 >= want, "{source} -> {element_type}: {got}");
        }
    }
    assert!(pairs.iter().any(|(a, b)| a == "agents-0" || b == "agents-0"));
}

/// The breaker also cuts the sampled strategy short, within budget.
#[tokio::test]
async fn test_circuit_breaker_in_sampled_mode() {
    let mut rng = StdRng::seed_from_u64(6);
    let mut elements = random_corpus(&mut rng, 60);
    let config = SamplingConfig {
        max_full_matrix: 10,
        max_comparisons: 50,
        circuit_breaker_ms: 20,
        seed: Some(6),
        ..SamplingConfig::default()
    };

    let report = RelationshipSampler::new(
        Arc::new(SlowSimilarity(Duration::from_millis(5))),
        config,
    )
    .calculate(&mut elements)
    .await;

    assert_eq!(report.strategy, SamplingStrategy::Sampled);
    assert!(report.timed_out);
    assert!(report.comparisons > 0);
    assert!(report.comparisons <= 50);
    assert_eq!(report.edges_created, report.comparisons * 2);
    assert_edges_mirrored(&elements);
}
