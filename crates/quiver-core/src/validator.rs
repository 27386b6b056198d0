//! Unicode content validator for serialized index text.

use std::collections::BTreeMap;

use crate::traits::{ContentValidator, ValidationReport};

/// Rejects control characters (other than tab, newline, and carriage
/// return), bidirectional overrides and isolates, zero-width characters, and
/// byte order marks.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeContentValidator;

impl UnicodeContentValidator {
    pub fn new() -> Self {
        Self
    }

    fn classify(c: char) -> Option<&'static str> {
        match c {
            '\t' | '\n' | '\r' => None,
            '\u{FEFF}' => Some("byte order mark"),
            '\u{202A}'..='\u{202E}' => Some("bidirectional override"),
            '\u{2066}'..='\u{2069}' => Some("bidirectional isolate"),
            '\u{200B}'..='\u{200D}' | '\u{2060}' => Some("zero-width character"),
            c if c.is_control() => Some("control character"),
            _ => None,
        }
    }
}

impl ContentValidator for UnicodeContentValidator {
    fn validate(&self, text: &str) -> ValidationReport {
        // Keyed by kind so one bad element doesn't flood the report.
        let mut found: BTreeMap<&'static str, (usize, usize, char)> = BTreeMap::new();
        for (line_idx, line) in text.lines().enumerate() {
            for c in line.chars() {
                if let Some(kind) = Self::classify(c) {
                    found
                        .entry(kind)
                        .and_modify(|(_, count, _)| *count += 1)
                        .or_insert((line_idx + 1, 1, c));
                }
            }
        }

        let issues = found
            .into_iter()
            .map(|(kind, (first_line, count, c))| {
                format!(
                    "{kind} U+{:04X} on line {first_line} ({count} occurrence{})",
                    c as u32,
                    if count == 1 { "" } else { "s" }
                )
            })
            .collect();
        ValidationReport { issues }
    }
}
