#![warn(missing_docs)]
//! # shutter-relay-catalog
//!
//! ## Purpose
//! Provides media-index abstractions and recency-based asset selection.
//!
//! ## Responsibilities
//! - Define a host-agnostic media index query trait.
//! - Select the newest images under a storage-path filter, bounded by a cap.
//! - Expose a filesystem-backed index for desktop targets and a
//!   deterministic in-memory index for CI and unit tests.
//!
//! ## Data flow
//! Controller asks [`select_recent`] for assets -> the [`MediaIndex`] backend
//! answers a ranked projection -> results become
//! [`shutter_relay_core::AssetReference`] values for the upload client.
//!
//! ## Error model
//! Index backends report [`CatalogError`]; [`select_recent`] itself never
//! raises. A failed query degrades to an empty selection, which callers must
//! treat as "nothing to upload", not as a run failure.
//!
//! ## Security and privacy notes
//! Query failures are logged without asset paths; selection is a recency
//! heuristic and makes no exact-ordering promise for equal timestamps.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use shutter_relay_core::AssetReference;
use thiserror::Error;
use tracing::warn;

/// File extensions treated as images by the filesystem index.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "bmp"];

/// Projection of one indexed media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    /// Stable identifier assigned by the index.
    pub id: String,
    /// Storage path with `/` separators.
    pub storage_path: String,
    /// Addition time in Unix epoch milliseconds.
    pub added_at_ms: u64,
}

/// Trait implemented by concrete media index backends.
pub trait MediaIndex: Send + Sync {
    /// Returns up to `max` images whose storage path contains
    /// `path_fragment`, newest first.
    ///
    /// # Errors
    /// Returns [`CatalogError::Query`] when the underlying store cannot be
    /// queried.
    fn recent_images(&self, max: usize, path_fragment: &str)
    -> Result<Vec<IndexedImage>, CatalogError>;
}

/// Applies the shared filter/sort/cap contract to raw index entries.
///
/// # Semantics
/// Path filter is a plain substring match; ordering is addition time
/// descending with a stable sort, so equal timestamps keep store order.
pub fn rank_newest_first(
    mut entries: Vec<IndexedImage>,
    max: usize,
    path_fragment: &str,
) -> Vec<IndexedImage> {
    entries.retain(|entry| entry.storage_path.contains(path_fragment));
    entries.sort_by(|a, b| b.added_at_ms.cmp(&a.added_at_ms));
    entries.truncate(max);
    entries
}

/// Selects the newest `max` assets whose path contains `path_fragment`.
///
/// Never raises: a backend query failure is logged and degrades to an empty
/// selection. Each fresh call re-queries the index.
pub fn select_recent(
    index: &dyn MediaIndex,
    max: usize,
    path_fragment: &str,
) -> Vec<AssetReference> {
    if max == 0 {
        return Vec::new();
    }

    let entries = match index.recent_images(max, path_fragment) {
        Ok(entries) => entries,
        Err(error) => {
            warn!(%error, "media index query failed; selecting nothing");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter(|entry| entry.storage_path.contains(path_fragment))
        .take(max)
        .filter_map(|entry| match AssetReference::new(entry.id, entry.storage_path) {
            Ok(asset) => Some(asset),
            Err(error) => {
                warn!(%error, "skipping malformed index entry");
                None
            }
        })
        .collect()
}

/// Media index backed by a filesystem subtree.
///
/// # Notes
/// Addition time is taken from file creation time, falling back to the
/// modification time on filesystems that do not record creation.
#[derive(Debug, Clone)]
pub struct FilesystemMediaIndex {
    root: PathBuf,
}

impl FilesystemMediaIndex {
    /// Creates an index rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MediaIndex for FilesystemMediaIndex {
    fn recent_images(
        &self,
        max: usize,
        path_fragment: &str,
    ) -> Result<Vec<IndexedImage>, CatalogError> {
        let mut entries = Vec::new();
        collect_images(&self.root, &mut entries)?;
        Ok(rank_newest_first(entries, max, path_fragment))
    }
}

fn collect_images(dir: &Path, out: &mut Vec<IndexedImage>) -> Result<(), CatalogError> {
    let reader = std::fs::read_dir(dir)
        .map_err(|error| CatalogError::Query(format!("cannot read '{}': {error}", dir.display())))?;

    for entry in reader {
        let entry = entry
            .map_err(|error| CatalogError::Query(format!("directory walk failed: {error}")))?;
        let path = entry.path();

        if path.is_dir() {
            collect_images(&path, out)?;
            continue;
        }

        if !has_image_extension(&path) {
            continue;
        }

        let metadata = entry.metadata().map_err(|error| {
            CatalogError::Query(format!("metadata read failed for '{}': {error}", path.display()))
        })?;
        let added_at = metadata.created().or_else(|_| metadata.modified()).map_err(|error| {
            CatalogError::Query(format!("timestamp unavailable for '{}': {error}", path.display()))
        })?;
        let added_at_ms = added_at
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_millis() as u64)
            .unwrap_or(0);

        // Normalized separators keep the `/DCIM/` filter portable.
        let storage_path = path.to_string_lossy().replace('\\', "/");
        out.push(IndexedImage {
            id: storage_path.clone(),
            storage_path,
            added_at_ms,
        });
    }

    Ok(())
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            let extension = extension.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&extension.as_str())
        })
        .unwrap_or(false)
}

/// Deterministic in-memory index for tests and CI.
#[derive(Debug, Default)]
pub struct InMemoryMediaIndex {
    entries: Vec<IndexedImage>,
}

impl InMemoryMediaIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an index seeded with `entries`.
    pub fn with_entries(entries: Vec<IndexedImage>) -> Self {
        Self { entries }
    }

    /// Adds one entry to the index.
    pub fn push(&mut self, entry: IndexedImage) {
        self.entries.push(entry);
    }
}

impl MediaIndex for InMemoryMediaIndex {
    fn recent_images(
        &self,
        max: usize,
        path_fragment: &str,
    ) -> Result<Vec<IndexedImage>, CatalogError> {
        Ok(rank_newest_first(self.entries.clone(), max, path_fragment))
    }
}

/// Catalog layer error type.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Underlying media store could not be queried.
    #[error("media index query failed: {0}")]
    Query(String),
}
