//! Text-similarity primitive trait.

use serde::{Deserialize, Serialize};

/// Pairwise relevance between two texts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Relevance {
    /// Term-set overlap in [0, 1].
    pub jaccard: f64,
    /// Overall similarity used for linking, in [0, 1].
    pub combined_score: f64,
}

/// Core TextSimilarity trait - entropy and pairwise relevance scoring.
///
/// Implementations must be deterministic for a given text pair.
pub trait TextSimilarity: Send + Sync {
    /// Lexical diversity of a text.
    fn entropy(&self, text: &str) -> f64;

    /// Relevance between two texts.
    fn relevance(&self, a: &str, b: &str) -> Relevance;

    /// Number of distinct terms in a text.
    fn unique_terms(&self, text: &str) -> usize {
        let mut terms: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();
        terms.sort();
        terms.dedup();
        terms.len()
    }

    /// Drop any internal caches. Best effort.
    fn clear_cache(&self) {}
}
