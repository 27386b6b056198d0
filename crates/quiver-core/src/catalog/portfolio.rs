//! On-disk portfolio catalog.
//!
//! Layout is `<root>/<type>/<file>` where each file is either markdown with
//! a `---` delimited YAML front matter block or a plain YAML document. The
//! directory name is the element type.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{QuiverError, QuiverResult};
use crate::traits::{CatalogListing, ElementCatalog};
use crate::types::CatalogEntry;

const FRONT_MATTER_DELIMITER: &str = "---";

/// Catalog backed by a portfolio directory.
#[derive(Debug, Clone)]
pub struct PortfolioCatalog {
    root: PathBuf,
}

impl PortfolioCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn list_type(&self, dir: &Path, element_type: &str) -> QuiverResult<Vec<CatalogEntry>> {
        let mut files = Vec::new();
        let mut reader = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| QuiverError::catalog_with_source(format!("read {}", dir.display()), e))?;
        while let Some(item) = reader
            .next_entry()
            .await
            .map_err(|e| QuiverError::catalog_with_source(format!("read {}", dir.display()), e))?
        {
            let path = item.path();
            if has_catalog_extension(&path) && entry_kind(&item).await == EntryKind::File {
                files.push(path);
            }
        }
        files.sort();

        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable catalog file");
                    continue;
                }
            };
            match parse_entry(&path, &text) {
                Ok(Some(mut entry)) => {
                    if entry.usable_name().is_none() {
                        warn!(path = %path.display(), "Skipping catalog file without a name");
                        continue;
                    }
                    entry.element_type = element_type.to_string();
                    entries.push(entry);
                }
                Ok(None) => {
                    debug!(path = %path.display(), "No metadata block, skipping");
                }
                Err(reason) => {
                    warn!(path = %path.display(), reason = %reason, "Skipping malformed catalog file");
                }
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl ElementCatalog for PortfolioCatalog {
    async fn list_entries(&self) -> QuiverResult<CatalogListing> {
        let mut listing = CatalogListing::new();
        let mut reader = match tokio::fs::read_dir(&self.root).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(root = %self.root.display(), "Portfolio directory does not exist");
                return Ok(listing);
            }
            Err(e) => {
                return Err(QuiverError::catalog_with_source(
                    format!("read {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut type_dirs = Vec::new();
        while let Some(item) = reader.next_entry().await.map_err(|e| {
            QuiverError::catalog_with_source(format!("read {}", self.root.display()), e)
        })? {
            let path = item.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with('.') && entry_kind(&item).await == EntryKind::Dir {
                type_dirs.push((name.to_string(), path));
            }
        }

        for (element_type, dir) in type_dirs {
            let entries = self.list_type(&dir, &element_type).await?;
            debug!(element_type = %element_type, count = entries.len(), "Listed portfolio type");
            listing.insert(element_type, entries);
        }
        Ok(listing)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
    Other,
}

/// Kind of a directory entry, following symlinks. Unreadable entries are
/// `Other`.
async fn entry_kind(item: &tokio::fs::DirEntry) -> EntryKind {
    let file_type = match item.file_type().await {
        Ok(ft) if ft.is_symlink() => match tokio::fs::metadata(item.path()).await {
            Ok(meta) => meta.file_type(),
            Err(_) => return EntryKind::Other,
        },
        Ok(ft) => ft,
        Err(_) => return EntryKind::Other,
    };
    if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_dir() {
        EntryKind::Dir
    } else {
        EntryKind::Other
    }
}

fn has_catalog_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md" | "yaml" | "yml")
    )
}

/// Parse one file. `Ok(None)` means a markdown file without front matter.
fn parse_entry(path: &Path, text: &str) -> Result<Option<CatalogEntry>, String> {
    let is_markdown = path.extension().and_then(|e| e.to_str()) == Some("md");
    let yaml = match parse_front_matter(text) {
        Some(block) => block,
        None if is_markdown => return Ok(None),
        None => text,
    };
    if yaml.trim().is_empty() {
        return Ok(None);
    }
    serde_yaml::from_str::<CatalogEntry>(yaml)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// The YAML between a leading `---` line and the next `---` line.
pub fn parse_front_matter(text: &str) -> Option<&str> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = text.strip_prefix(FRONT_MATTER_DELIMITER)?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            return Some(&rest[..offset]);
        }
        offset += line.len();
    }
    None
}
