//! Cross-process build lock.
//!
//! The lock is a marker file next to the index, created with `create_new`
//! and holding the owner's pid, acquisition time, and a random nonce. A
//! marker older than the stale-after window is treated as abandoned and
//! reclaimed by renaming it aside; a reclaimer that finds it moved a
//! different marker than the one it judged abandoned links it back. Only
//! the holder whose nonce is in the file removes it.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{QuiverError, QuiverResult};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Contents of the lock marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub nonce: u64,
}

/// Lock marker path for an index file (`<index>.lock`).
pub fn lock_path_for(index_path: &Path) -> PathBuf {
    let mut name = index_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "capability-index".into());
    name.push(".lock");
    index_path.with_file_name(name)
}

/// A held build lock. Released explicitly with [`BuildLock::release`], or
/// on drop as a fallback.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
    nonce: u64,
    released: bool,
}

impl BuildLock {
    /// Try to take the lock for `index_path`, polling until `timeout`.
    ///
    /// Returns `Ok(None)` when another holder keeps the lock for the whole
    /// timeout. Only unexpected IO failures are errors.
    pub async fn acquire(
        index_path: &Path,
        timeout: Duration,
        stale_after: Duration,
    ) -> QuiverResult<Option<Self>> {
        let path = lock_path_for(index_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut record = LockRecord {
            pid: std::process::id(),
            acquired_at: Utc::now(),
            nonce: rand::random(),
        };
        let deadline = Instant::now() + timeout;

        loop {
            record.acquired_at = Utc::now();
            match create_marker(&path, &record).await {
                Ok(()) => {
                    debug!(path = %path.display(), "Build lock acquired");
                    return Ok(Some(Self {
                        path,
                        nonce: record.nonce,
                        released: false,
                    }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if let Some(stale) = abandoned_marker(&path, stale_after).await {
                        warn!(path = %path.display(), "Reclaiming abandoned build lock");
                        if reclaim(&path, &stale, record.nonce).await? {
                            continue;
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(path = %path.display(), "Build lock held elsewhere, giving up");
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the marker if it is still ours.
    pub async fn release(mut self) -> QuiverResult<()> {
        self.released = true;
        let owned = match tokio::fs::read(&self.path).await {
            Ok(bytes) => owns(&bytes, self.nonce),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if !owned {
            warn!(path = %self.path.display(), "Build lock was reclaimed by another holder");
            return Ok(());
        }
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Build lock released");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(QuiverError::persist_with_source("failed to release build lock", e)),
        }
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Ok(bytes) = std::fs::read(&self.path) {
            if owns(&bytes, self.nonce) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }
}

fn owns(bytes: &[u8], nonce: u64) -> bool {
    serde_json::from_slice::<LockRecord>(bytes)
        .map(|record| record.nonce == nonce)
        .unwrap_or(false)
}

async fn create_marker(path: &Path, record: &LockRecord) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    let bytes = serde_json::to_vec(record)?;
    file.write_all(&bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// The marker's bytes if it is abandoned: its recorded acquisition time,
/// or its mtime if the record is unreadable, is older than `stale_after`.
async fn abandoned_marker(path: &Path, stale_after: Duration) -> Option<Vec<u8>> {
    let bytes = tokio::fs::read(path).await.ok()?;
    let abandoned = match serde_json::from_slice::<LockRecord>(&bytes) {
        Ok(record) => Utc::now()
            .signed_duration_since(record.acquired_at)
            .to_std()
            .map(|age| age > stale_after)
            .unwrap_or(false),
        Err(_) => match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(mtime) => SystemTime::now()
                .duration_since(mtime)
                .map(|age| age > stale_after)
                .unwrap_or(false),
            Err(_) => false,
        },
    };
    abandoned.then_some(bytes)
}

/// Move the abandoned marker aside and drop it.
///
/// Rename is atomic, so of two reclaimers only one moves a given marker.
/// Returns false when the moved marker is not the one judged abandoned (a
/// faster reclaimer already replaced it); that marker is linked back
/// unless a new one has appeared in the meantime.
async fn reclaim(path: &Path, stale: &[u8], nonce: u64) -> QuiverResult<bool> {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".stale-{nonce:016x}"));
    let tombstone = path.with_file_name(name);

    match tokio::fs::rename(path, &tombstone).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    }

    let moved = tokio::fs::read(&tombstone).await.unwrap_or_default();
    let matched = moved == stale;
    if !matched {
        warn!(path = %path.display(), "Moved a live build lock while reclaiming, restoring it");
        match tokio::fs::hard_link(&tombstone, path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Could not restore build lock"),
        }
    }
    if let Err(e) = tokio::fs::remove_file(&tombstone).await {
        debug!(path = %tombstone.display(), error = %e, "Could not remove lock tombstone");
    }
    Ok(matched)
}
