//! Term-overlap text similarity.
//!
//! Deterministic reference implementation of [`TextSimilarity`]: Shannon
//! entropy over term frequencies, Jaccard over term sets, and a combined
//! score averaging Jaccard with term-frequency cosine similarity.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::traits::{Relevance, TextSimilarity};

const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "into", "is", "it", "its",
    "of", "on", "or", "that", "the", "this", "to", "with", "your", "you",
];

/// Default number of memoised term vectors.
pub const DEFAULT_TERM_CACHE_SIZE: usize = 1024;

/// Term frequencies for one text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermVector {
    counts: BTreeMap<String, usize>,
    total: usize,
}

impl TermVector {
    pub fn from_text(text: &str) -> Self {
        let mut counts = BTreeMap::new();
        let mut total = 0;
        for term in tokenize(text) {
            *counts.entry(term).or_insert(0) += 1;
            total += 1;
        }
        Self { counts, total }
    }

    pub fn unique_terms(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Shannon entropy in bits.
    pub fn entropy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let total = self.total as f64;
        self.counts
            .values()
            .map(|&count| {
                let p = count as f64 / total;
                -p * p.log2()
            })
            .sum()
    }

    pub fn jaccard(&self, other: &TermVector) -> f64 {
        let intersection = self
            .counts
            .keys()
            .filter(|term| other.counts.contains_key(*term))
            .count();
        let union = self.counts.len() + other.counts.len() - intersection;
        if union == 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }

    /// Cosine similarity of the raw term-frequency vectors.
    pub fn cosine(&self, other: &TermVector) -> f64 {
        let dot: f64 = self
            .counts
            .iter()
            .filter_map(|(term, &a)| other.counts.get(term).map(|&b| (a * b) as f64))
            .sum();
        let norm_a = norm(&self.counts);
        let norm_b = norm(&other.counts);
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

fn norm(counts: &BTreeMap<String, usize>) -> f64 {
    counts
        .values()
        .map(|&c| (c * c) as f64)
        .sum::<f64>()
        .sqrt()
}

/// Lowercased alphanumeric runs of two or more characters, minus stop words.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
}

/// Term-overlap similarity with a bounded per-text cache.
pub struct TermSimilarity {
    cache: Mutex<HashMap<String, Arc<TermVector>>>,
    capacity: usize,
}

impl Default for TermSimilarity {
    fn default() -> Self {
        Self::new()
    }
}

impl TermSimilarity {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TERM_CACHE_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Number of cached term vectors.
    pub fn cached(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn vector(&self, text: &str) -> Arc<TermVector> {
        let Ok(mut cache) = self.cache.lock() else {
            return Arc::new(TermVector::from_text(text));
        };
        if let Some(vector) = cache.get(text) {
            return Arc::clone(vector);
        }
        if self.capacity == 0 {
            return Arc::new(TermVector::from_text(text));
        }
        if cache.len() >= self.capacity {
            cache.clear();
        }
        let vector = Arc::new(TermVector::from_text(text));
        cache.insert(text.to_string(), Arc::clone(&vector));
        vector
    }
}

impl TextSimilarity for TermSimilarity {
    fn entropy(&self, text: &str) -> f64 {
        self.vector(text).entropy()
    }

    fn relevance(&self, a: &str, b: &str) -> Relevance {
        let va = self.vector(a);
        let vb = self.vector(b);
        let jaccard = va.jaccard(&vb);
        let combined_score = (jaccard + va.cosine(&vb)) / 2.0;
        Relevance {
            jaccard,
            combined_score,
        }
    }

    fn unique_terms(&self, text: &str) -> usize {
        self.vector(text).unique_terms()
    }

    fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}
