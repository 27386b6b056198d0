//! Verb-likeness classification for keyword triggers.
//!
//! A token is verb-like when it starts with a known verb prefix or ends with
//! a verb suffix, unless it ends with a noun suffix. The noun check always
//! wins, so "documentation" is rejected even though it starts with
//! "document".

use regex::Regex;

use crate::config::TriggerConfig;
use crate::error::{QuiverError, QuiverResult};

const VERB_PREFIXES: &[&str] = &[
    "create", "build", "generate", "make", "write", "draft", "compose", "debug", "fix",
    "troubleshoot", "analy[sz]e", "review", "audit", "inspect", "test", "check", "validate",
    "verify", "update", "edit", "modify", "refactor", "rewrite", "delete", "remove", "clean",
    "optimi[sz]e", "improve", "enhance", "explain", "summari[sz]e", "translate", "convert",
    "format", "deploy", "release", "design", "plan", "search", "find", "research", "document",
    "brainstorm", "teach", "learn", "monitor", "track", "organi[sz]e", "schedule", "automate",
];

const VERB_SUFFIXES: &[&str] = &["ify", "ize", "ise", "ate"];

const NOUN_SUFFIXES: &[&str] = &[
    "tion", "sion", "ment", "ness", "ity", "ance", "ence", "ship", "ism", "ist", "hood", "dom",
];

/// Tokens the compiled table must accept.
const KNOWN_VERBS: &[&str] = &["create", "debug", "analyze", "simplify", "optimize", "summarise"];

/// Tokens the compiled table must reject.
const KNOWN_NON_VERBS: &[&str] = &["documentation", "management", "happiness", "code", "persona"];

/// Compiled verb/noun rule table.
#[derive(Debug, Clone)]
pub struct VerbClassifier {
    verb_prefix: Regex,
    verb_suffix: Regex,
    noun_suffix: Regex,
}

impl VerbClassifier {
    /// Build the default table without custom patterns.
    pub fn with_defaults() -> QuiverResult<Self> {
        Self::new(&TriggerConfig::default())
    }

    /// Compile the default patterns plus any custom ones and check the
    /// result against known verbs and non-verbs.
    ///
    /// Any custom fragment that does not compile, or a table that
    /// misclassifies a known example, is a configuration error.
    pub fn new(config: &TriggerConfig) -> QuiverResult<Self> {
        let verb_prefix = compile_alternation(
            "verb prefix",
            VERB_PREFIXES,
            &config.custom_verb_prefixes,
            |alt| format!("^(?:{alt})"),
        )?;
        let verb_suffix = compile_alternation(
            "verb suffix",
            VERB_SUFFIXES,
            &config.custom_verb_suffixes,
            |alt| format!("(?:{alt})$"),
        )?;
        let noun_suffix = compile_alternation(
            "noun suffix",
            NOUN_SUFFIXES,
            &config.custom_noun_suffixes,
            |alt| format!("(?:{alt})$"),
        )?;

        let classifier = Self {
            verb_prefix,
            verb_suffix,
            noun_suffix,
        };
        classifier.self_check()?;
        Ok(classifier)
    }

    /// Whether a normalised token reads as an action verb.
    pub fn is_verb_like(&self, token: &str) -> bool {
        if self.noun_suffix.is_match(token) {
            return false;
        }
        self.verb_prefix.is_match(token) || self.verb_suffix.is_match(token)
    }

    fn self_check(&self) -> QuiverResult<()> {
        for verb in KNOWN_VERBS {
            if !self.is_verb_like(verb) {
                return Err(QuiverError::invalid_pattern(format!(
                    "trigger patterns reject known verb '{verb}'"
                )));
            }
        }
        for word in KNOWN_NON_VERBS {
            if self.is_verb_like(word) {
                return Err(QuiverError::invalid_pattern(format!(
                    "trigger patterns accept known non-verb '{word}'"
                )));
            }
        }
        Ok(())
    }
}

fn compile_alternation(
    label: &str,
    defaults: &[&str],
    custom: &[String],
    wrap: impl Fn(&str) -> String,
) -> QuiverResult<Regex> {
    for fragment in custom {
        if fragment.trim().is_empty() {
            return Err(QuiverError::invalid_pattern(format!("empty custom {label} pattern")));
        }
        Regex::new(fragment).map_err(|e| {
            QuiverError::invalid_pattern(format!("custom {label} pattern '{fragment}': {e}"))
        })?;
    }

    let alternation = defaults
        .iter()
        .copied()
        .chain(custom.iter().map(String::as_str))
        .map(|fragment| format!("(?:{fragment})"))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Regex::new(&wrap(&alternation))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classification() {
        let classifier = VerbClassifier::with_defaults().unwrap();
        assert!(classifier.is_verb_like("debug"));
        assert!(classifier.is_verb_like("debugging"));
        assert!(classifier.is_verb_like("simplify"));
        assert!(classifier.is_verb_like("validate"));
        assert!(!classifier.is_verb_like("documentation"));
        assert!(!classifier.is_verb_like("code"));
        assert!(!classifier.is_verb_like("optimization"));
    }

    #[test]
    fn test_custom_prefix_is_used() {
        let config = TriggerConfig {
            custom_verb_prefixes: vec!["sketch".to_string()],
            ..Default::default()
        };
        let classifier = VerbClassifier::new(&config).unwrap();
        assert!(classifier.is_verb_like("sketch"));
    }

    #[test]
    fn test_invalid_custom_pattern_is_fatal() {
        let config = TriggerConfig {
            custom_noun_suffixes: vec!["(tion".to_string()],
            ..Default::default()
        };
        let err = VerbClassifier::new(&config).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("(tion"));
    }

    #[test]
    fn test_custom_pattern_breaking_known_examples_is_fatal() {
        // Vetoes every token ending in "e", including "create".
        let config = TriggerConfig {
            custom_noun_suffixes: vec!["e".to_string()],
            ..Default::default()
        };
        let err = VerbClassifier::new(&config).unwrap_err();
        assert!(err.to_string().contains("create"));
    }

    #[test]
    fn test_empty_custom_pattern_is_fatal() {
        let config = TriggerConfig {
            custom_verb_suffixes: vec!["  ".to_string()],
            ..Default::default()
        };
        assert!(VerbClassifier::new(&config).unwrap_err().is_configuration());
    }
}
