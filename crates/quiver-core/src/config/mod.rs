//! Configuration system for quiver.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{QuiverError, QuiverResult};

/// Full-matrix comparison is never used above this many elements, whatever
/// the configuration says.
pub const HARD_MAX_FULL_MATRIX: usize = 50;

/// Upper bound on relevance calls in sampled mode.
pub const HARD_MAX_COMPARISONS: usize = 500;

/// Index file location, freshness, and build-lock timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the persisted YAML index.
    pub index_path: PathBuf,
    /// Maximum file age before the index is rebuilt.
    pub ttl_secs: u64,
    /// How long a rebuild waits for the build lock before giving up.
    pub lock_timeout_ms: u64,
    /// Age after which a held lock is considered abandoned.
    pub lock_stale_after_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let quiver_dir = dirs::home_dir()
            .map(|h| h.join(".quiver"))
            .unwrap_or_else(|| PathBuf::from(".quiver"));

        Self {
            index_path: quiver_dir.join("capability-index.yaml"),
            ttl_secs: 300,
            lock_timeout_ms: 5_000,
            lock_stale_after_ms: 60_000,
        }
    }
}

impl StoreConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_millis(self.lock_stale_after_ms)
    }
}

/// Tunables for relationship sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Combined score an element pair must exceed to be linked.
    /// Range: 0.0-1.0. Default: 0.3
    pub similarity_threshold: f64,
    /// Comparisons between cooperative yields in full-matrix mode.
    pub batch_size: usize,
    /// Element count up to which every pair is compared.
    /// Capped at [`HARD_MAX_FULL_MATRIX`].
    pub max_full_matrix: usize,
    /// Relevance-call budget for sampled mode.
    /// Capped at [`HARD_MAX_COMPARISONS`].
    pub max_comparisons: usize,
    /// Upper bound on the per-element sample inside a keyword cluster.
    pub cluster_sample_cap: usize,
    /// Share of the budget reserved for the keyword-cluster pass.
    /// The rest goes to the cross-type pass. Default: 0.6
    pub cluster_budget_ratio: f64,
    /// Wall-clock limit for one relationship calculation.
    pub circuit_breaker_ms: u64,
    /// Fixed RNG seed for reproducible sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
            batch_size: 10,
            max_full_matrix: 20,
            max_comparisons: HARD_MAX_COMPARISONS,
            cluster_sample_cap: 10,
            cluster_budget_ratio: 0.6,
            circuit_breaker_ms: 5_000,
            seed: None,
        }
    }
}

impl SamplingConfig {
    /// Full-matrix ceiling after the hard safety cap.
    pub fn effective_max_full_matrix(&self) -> usize {
        self.max_full_matrix.min(HARD_MAX_FULL_MATRIX)
    }

    /// Comparison budget after the hard safety cap.
    pub fn effective_max_comparisons(&self) -> usize {
        self.max_comparisons.min(HARD_MAX_COMPARISONS)
    }

    pub fn circuit_breaker(&self) -> Duration {
        Duration::from_millis(self.circuit_breaker_ms)
    }
}

/// Limits and custom classification patterns for trigger extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Maximum triggers registered for one element.
    pub max_triggers_per_element: usize,
    /// Longest accepted trigger, in characters.
    pub max_trigger_length: usize,
    /// Maximum declared actions inspected per element.
    pub max_action_triggers: usize,
    /// Maximum keywords inspected per element.
    pub max_keyword_triggers: usize,
    /// Extra regex fragments recognised as verb prefixes.
    pub custom_verb_prefixes: Vec<String>,
    /// Extra regex fragments recognised as verb suffixes.
    pub custom_verb_suffixes: Vec<String>,
    /// Extra regex fragments that veto verb classification.
    pub custom_noun_suffixes: Vec<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            max_triggers_per_element: 50,
            max_trigger_length: 50,
            max_action_triggers: 20,
            max_keyword_triggers: 20,
            custom_verb_prefixes: Vec::new(),
            custom_verb_suffixes: Vec::new(),
            custom_noun_suffixes: Vec::new(),
        }
    }
}

/// Background memory cleanup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    /// Seconds between cleanup sweeps (default: 300)
    pub cleanup_interval_secs: u64,
    /// The in-memory index is dropped once older than `ttl * stale_multiplier`.
    pub stale_multiplier: f64,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 300,
            stale_multiplier: 2.0,
        }
    }
}

impl GuardianConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

/// Main capability index configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub store: StoreConfig,
    pub sampling: SamplingConfig,
    pub triggers: TriggerConfig,
    pub guardian: GuardianConfig,
}

impl IndexConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> QuiverResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| QuiverError::configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| QuiverError::configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| QuiverError::configuration(e.to_string()))?,
            _ => {
                return Err(QuiverError::Configuration {
                    message: "Unsupported config file format. Use .toml, .json, or .yaml"
                        .to_string(),
                    code: crate::error::ErrorCode::CfgUnsupportedFormat,
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Unparseable numeric values are ignored and the default kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("QUIVER_INDEX_PATH") {
            config.store.index_path = PathBuf::from(path);
        }
        if let Some(ttl) = env_parse("QUIVER_INDEX_TTL_SECS") {
            config.store.ttl_secs = ttl;
        }
        if let Some(timeout) = env_parse("QUIVER_LOCK_TIMEOUT_MS") {
            config.store.lock_timeout_ms = timeout;
        }
        if let Some(threshold) = env_parse("QUIVER_SIMILARITY_THRESHOLD") {
            config.sampling.similarity_threshold = threshold;
        }
        if let Some(max) = env_parse("QUIVER_MAX_COMPARISONS") {
            config.sampling.max_comparisons = max;
        }
        if let Some(ms) = env_parse("QUIVER_CIRCUIT_BREAKER_MS") {
            config.sampling.circuit_breaker_ms = ms;
        }
        if let Some(secs) = env_parse("QUIVER_CLEANUP_INTERVAL_SECS") {
            config.guardian.cleanup_interval_secs = secs;
        }
        if let Ok(list) = std::env::var("QUIVER_VERB_PREFIXES") {
            config.triggers.custom_verb_prefixes = split_list(&list);
        }
        if let Ok(list) = std::env::var("QUIVER_NOUN_SUFFIXES") {
            config.triggers.custom_noun_suffixes = split_list(&list);
        }

        config
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    /// Check that every tunable is in range.
    pub fn validate(&self) -> QuiverResult<()> {
        if self.store.ttl_secs == 0 {
            return Err(QuiverError::configuration("store.ttl_secs must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.sampling.similarity_threshold) {
            return Err(QuiverError::configuration(
                "sampling.similarity_threshold must be between 0.0 and 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.sampling.cluster_budget_ratio) {
            return Err(QuiverError::configuration(
                "sampling.cluster_budget_ratio must be between 0.0 and 1.0",
            ));
        }
        if self.sampling.batch_size == 0 {
            return Err(QuiverError::configuration("sampling.batch_size must be at least 1"));
        }
        if self.triggers.max_triggers_per_element == 0 || self.triggers.max_trigger_length == 0 {
            return Err(QuiverError::configuration(
                "trigger limits must be at least 1",
            ));
        }
        if self.guardian.stale_multiplier < 1.0 {
            return Err(QuiverError::configuration(
                "guardian.stale_multiplier must be at least 1.0",
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Builder for IndexConfig.
#[derive(Default)]
pub struct IndexConfigBuilder {
    config: IndexConfig,
}

impl IndexConfigBuilder {
    /// Set the index file path.
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store.index_path = path.into();
        self
    }

    /// Set the index TTL in seconds.
    pub fn ttl_secs(mut self, ttl: u64) -> Self {
        self.config.store.ttl_secs = ttl;
        self
    }

    /// Set build-lock timing.
    pub fn lock_timing(mut self, timeout_ms: u64, stale_after_ms: u64) -> Self {
        self.config.store.lock_timeout_ms = timeout_ms;
        self.config.store.lock_stale_after_ms = stale_after_ms;
        self
    }

    /// Set sampling configuration.
    pub fn sampling(mut self, sampling: SamplingConfig) -> Self {
        self.config.sampling = sampling;
        self
    }

    /// Set trigger configuration.
    pub fn triggers(mut self, triggers: TriggerConfig) -> Self {
        self.config.triggers = triggers;
        self
    }

    /// Set guardian configuration.
    pub fn guardian(mut self, guardian: GuardianConfig) -> Self {
        self.config.guardian = guardian;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> IndexConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = IndexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.triggers.max_triggers_per_element, 50);
        assert_eq!(config.triggers.max_trigger_length, 50);
        assert!((config.sampling.cluster_budget_ratio - 0.6).abs() < f64::EPSILON);
        assert!(config.store.index_path.ends_with("capability-index.yaml"));
    }

    #[test]
    fn test_hard_ceilings_apply() {
        let sampling = SamplingConfig {
            max_full_matrix: 10_000,
            max_comparisons: 1_000_000,
            ..Default::default()
        };
        assert_eq!(sampling.effective_max_full_matrix(), HARD_MAX_FULL_MATRIX);
        assert_eq!(sampling.effective_max_comparisons(), HARD_MAX_COMPARISONS);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = IndexConfig::default();
        config.sampling.similarity_threshold = 1.5;
        assert!(config.validate().unwrap_err().is_configuration());

        let mut config = IndexConfig::default();
        config.guardian.stale_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiver.yaml");
        std::fs::write(
            &path,
            "store:\n  ttl_secs: 60\nsampling:\n  max_comparisons: 42\n",
        )
        .unwrap();

        let config = IndexConfig::from_file(&path).unwrap();
        assert_eq!(config.store.ttl_secs, 60);
        assert_eq!(config.sampling.max_comparisons, 42);
        // Untouched sections keep defaults
        assert_eq!(config.sampling.batch_size, 10);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiver.ini");
        std::fs::write(&path, "").unwrap();
        let err = IndexConfig::from_file(&path).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::CfgUnsupportedFormat);
    }

    #[test]
    fn test_builder() {
        let config = IndexConfig::builder()
            .index_path("/tmp/index.yaml")
            .ttl_secs(10)
            .lock_timing(100, 1_000)
            .build();
        assert_eq!(config.store.index_path, PathBuf::from("/tmp/index.yaml"));
        assert_eq!(config.store.ttl(), Duration::from_secs(10));
        assert_eq!(config.store.lock_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, b ,,c"), vec!["a", "b", "c"]);
    }
}
