//! Verb trigger extraction.
//!
//! Triggers come from declared triggers, declared actions, and verb-like
//! keywords, in that order, under per-element and per-source caps.

mod extractor;
mod patterns;

pub use extractor::{ExtractedTriggers, TriggerExtractor, TriggerSource};
pub use patterns::VerbClassifier;
