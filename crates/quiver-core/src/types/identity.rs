//! `type:name` element identities.

use std::fmt;
use std::str::FromStr;

use crate::error::{QuiverError, QuiverResult};

/// Identity of an element: its type bucket plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId {
    pub element_type: String,
    pub name: String,
}

impl ElementId {
    pub fn new(element_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            element_type: element_type.into(),
            name: name.into(),
        }
    }

    /// Parse `type:name`, splitting on the first colon. Names may contain
    /// further colons.
    pub fn parse(raw: &str) -> QuiverResult<Self> {
        let (element_type, name) = raw
            .split_once(':')
            .ok_or_else(|| QuiverError::invalid_identity(raw))?;
        let element_type = element_type.trim();
        let name = name.trim();
        if element_type.is_empty() || name.is_empty() {
            return Err(QuiverError::invalid_identity(raw));
        }
        Ok(Self::new(element_type, name))
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.element_type, self.name)
    }
}

impl FromStr for ElementId {
    type Err = QuiverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
