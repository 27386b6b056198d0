//! Similarity relationship sampling.

mod budget;
mod clusters;
mod sampler;

pub use budget::{CircuitBreaker, ComparisonBudget};
pub use clusters::keyword_clusters;
pub use sampler::{RelationshipSampler, SamplingReport, SamplingStrategy};
