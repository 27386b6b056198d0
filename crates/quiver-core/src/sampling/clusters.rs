//! Keyword clusters for the sampled strategy.

use std::collections::BTreeMap;

/// Group node indices by shared keyword or tag (case-insensitive).
///
/// Singleton clusters carry no signal and clusters covering more than half
/// of all nodes are too common to be informative; both are dropped.
pub fn keyword_clusters(terms_per_node: &[Vec<String>]) -> BTreeMap<String, Vec<usize>> {
    let total = terms_per_node.len();
    let mut clusters: BTreeMap<String, Vec<usize>> = BTreeMap::new();

    for (idx, terms) in terms_per_node.iter().enumerate() {
        for term in terms {
            let key = term.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            let members = clusters.entry(key).or_default();
            if members.last() != Some(&idx) {
                members.push(idx);
            }
        }
    }

    clusters.retain(|_, members| members.len() >= 2 && members.len() <= total / 2);
    clusters
}
