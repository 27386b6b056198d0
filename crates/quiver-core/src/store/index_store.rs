//! On-disk capability index.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{QuiverError, QuiverResult};
use crate::traits::ContentValidator;
use crate::types::CapabilityIndex;
use crate::validator::UnicodeContentValidator;

use super::lock::BuildLock;

/// Top-level sections that must be mappings for a file to be usable.
const REQUIRED_SECTIONS: &[&str] = &["metadata", "elements", "action_triggers"];

/// Result of reading the persisted index.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Box<CapabilityIndex>),
    /// No file at the index path.
    Missing,
    /// Unreadable or structurally invalid; the reason is for logging.
    Invalid(String),
}

/// Reads, writes, and locks the persisted index file.
pub struct IndexStore {
    path: PathBuf,
    ttl: Duration,
    validator: Arc<dyn ContentValidator>,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            validator: Arc::new(UnicodeContentValidator::new()),
        }
    }

    /// Replace the content validator run before every save.
    pub fn with_validator(mut self, validator: Arc<dyn ContentValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Read and parse the index. Never fails: problems come back as
    /// [`LoadOutcome::Missing`] or [`LoadOutcome::Invalid`].
    pub async fn load(&self) -> LoadOutcome {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::Missing,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read index file");
                return LoadOutcome::Invalid(e.to_string());
            }
        };

        match parse_index(&text) {
            Ok(index) => {
                debug!(
                    path = %self.path.display(),
                    elements = index.element_count(),
                    "Loaded capability index"
                );
                LoadOutcome::Loaded(Box::new(index))
            }
            Err(reason) => {
                warn!(path = %self.path.display(), reason = %reason, "Index file is invalid");
                LoadOutcome::Invalid(reason)
            }
        }
    }

    /// Whether the file is missing or older than the TTL.
    pub async fn is_stale(&self) -> bool {
        self.is_stale_at(SystemTime::now()).await
    }

    /// Staleness as seen at `now`.
    pub async fn is_stale_at(&self, now: SystemTime) -> bool {
        let Some(modified) = self.modified().await else {
            return true;
        };
        // A clock behind the file's mtime counts as fresh.
        now.duration_since(modified)
            .map(|age| age > self.ttl)
            .unwrap_or(false)
    }

    /// Modification time of the index file, if it exists.
    pub async fn modified(&self) -> Option<SystemTime> {
        tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
            .ok()
    }

    /// Validate and atomically write the index.
    pub async fn save(&self, index: &CapabilityIndex) -> QuiverResult<()> {
        let text = serde_yaml::to_string(index)?;

        let report = self.validator.validate(&text);
        if !report.is_clean() {
            warn!(issues = report.issues.len(), "Serialized index rejected by content validator");
            return Err(QuiverError::content_rejected(report.issues));
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    QuiverError::persist_with_source(
                        format!("failed to create {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let tmp = self.temp_path();
        if let Err(e) = write_synced(&tmp, text.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(QuiverError::persist_with_source(
                format!("failed to write {}", tmp.display()),
                e,
            ));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(QuiverError::persist_with_source(
                format!("failed to replace {}", self.path.display()),
                e,
            ));
        }

        info!(
            path = %self.path.display(),
            elements = index.metadata.total_elements,
            bytes = text.len(),
            "Capability index saved"
        );
        Ok(())
    }

    /// Take the cross-process build lock for this index.
    pub async fn acquire_build_lock(
        &self,
        timeout: Duration,
        stale_after: Duration,
    ) -> QuiverResult<Option<BuildLock>> {
        BuildLock::acquire(&self.path, timeout, stale_after).await
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "capability-index".into());
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

/// Parse index text, checking the required sections before typed decoding.
pub fn parse_index(text: &str) -> Result<CapabilityIndex, String> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| format!("parse failure: {e}"))?;
    let Some(root) = value.as_mapping() else {
        return Err("document root is not a mapping".to_string());
    };
    for section in REQUIRED_SECTIONS {
        match root.get(*section) {
            Some(v) if v.is_mapping() => {}
            Some(_) => return Err(format!("'{section}' is not a mapping")),
            None => return Err(format!("'{section}' is missing")),
        }
    }
    serde_yaml::from_value(value).map_err(|e| format!("schema mismatch: {e}"))
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}
