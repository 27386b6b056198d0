//! Content validator trait.

/// Outcome of validating serialized index text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Checks serialized text for disallowed encodings before it is persisted.
pub trait ContentValidator: Send + Sync {
    fn validate(&self, text: &str) -> ValidationReport;
}
