//! Verb trigger extraction for element definitions.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::TriggerConfig;
use crate::error::QuiverResult;
use crate::types::{register_trigger, ElementDefinition};

use super::patterns::VerbClassifier;

static TRIGGER_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z-]*$").expect("static trigger pattern"));

/// Which source a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Declared,
    Action,
    Keyword,
}

/// Triggers extracted for one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedTriggers {
    pub triggers: Vec<String>,
    /// True when the per-element cap cut extraction short.
    pub truncated: bool,
}

/// Derives normalised verb triggers from declared triggers, actions, and
/// keywords, in that priority order.
#[derive(Debug, Clone)]
pub struct TriggerExtractor {
    classifier: VerbClassifier,
    config: TriggerConfig,
}

impl TriggerExtractor {
    /// Compile the classifier. Fails on invalid custom patterns.
    pub fn new(config: &TriggerConfig) -> QuiverResult<Self> {
        Ok(Self {
            classifier: VerbClassifier::new(config)?,
            config: config.clone(),
        })
    }

    /// Lowercase and trim, then reject anything that is not a plain
    /// hyphenated word or is too long.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let candidate = raw.trim().to_lowercase();
        if candidate.is_empty() || candidate.chars().count() > self.config.max_trigger_length {
            return None;
        }
        TRIGGER_SHAPE.is_match(&candidate).then_some(candidate)
    }

    /// Extract triggers for a definition without registering them.
    pub fn extract(&self, definition: &ElementDefinition) -> ExtractedTriggers {
        let limit = self.config.max_triggers_per_element;
        let mut collector = Collector::new(limit);

        let declared = definition
            .search
            .triggers
            .iter()
            .map(|t| (t.as_str(), TriggerSource::Declared));

        let actions = definition
            .actions
            .iter()
            .flat_map(|actions| actions.iter())
            .take(self.config.max_action_triggers)
            .map(|(key, action)| {
                let verb = if action.verb.trim().is_empty() {
                    key.as_str()
                } else {
                    action.verb.as_str()
                };
                (verb, TriggerSource::Action)
            });

        let keywords = definition
            .search
            .keywords
            .iter()
            .take(self.config.max_keyword_triggers)
            .map(|k| (k.as_str(), TriggerSource::Keyword));

        for (raw, source) in declared.chain(actions).chain(keywords) {
            let Some(trigger) = self.normalize(raw) else {
                debug!(element = %definition.core.name, raw, "Rejected trigger candidate");
                continue;
            };
            if source == TriggerSource::Keyword && !self.classifier.is_verb_like(&trigger) {
                continue;
            }
            if !collector.push(trigger) {
                break;
            }
        }

        let extracted = collector.finish();
        if extracted.truncated {
            warn!(
                element = %definition.identity(),
                limit,
                "Trigger limit reached, remaining sources skipped"
            );
        }
        extracted
    }

    /// Extract triggers and register them under the element's name.
    pub fn extract_into(
        &self,
        definition: &ElementDefinition,
        action_triggers: &mut BTreeMap<String, Vec<String>>,
    ) -> ExtractedTriggers {
        let extracted = self.extract(definition);
        for trigger in &extracted.triggers {
            register_trigger(action_triggers, trigger, &definition.core.name);
        }
        extracted
    }

    /// Access the verb classifier.
    pub fn classifier(&self) -> &VerbClassifier {
        &self.classifier
    }
}

struct Collector {
    limit: usize,
    triggers: Vec<String>,
    truncated: bool,
}

impl Collector {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            triggers: Vec::new(),
            truncated: false,
        }
    }

    /// Returns false once the cap has been hit and a further distinct
    /// trigger was offered.
    fn push(&mut self, trigger: String) -> bool {
        if self.triggers.contains(&trigger) {
            return true;
        }
        if self.triggers.len() >= self.limit {
            self.truncated = true;
            return false;
        }
        self.triggers.push(trigger);
        true
    }

    fn finish(self) -> ExtractedTriggers {
        ExtractedTriggers {
            triggers: self.triggers,
            truncated: self.truncated,
        }
    }
}
