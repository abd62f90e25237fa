//! Dataset Store: the concurrent table of loaded archives.
//!
//! The store is the only owner of archive handles. Everything else borrows
//! an `Arc<Dataset>` for the length of one call.
//!
//! - Insert is insert-if-absent: the first writer of an identifier wins
//! - Eviction removes the entry atomically, then closes its handle, so a
//!   handle found in the table is always open
//! - The table is lock-striped (`DashMap`); operations on distinct
//!   identifiers do not contend
//!
//! # Example
//!
//! ```ignore
//! use mbtiles_streamer::archive::MbtilesOpener;
//! use mbtiles_streamer::dataset::DatasetStore;
//!
//! let store = DatasetStore::new(MbtilesOpener::new());
//! let loaded = store.scan(Path::new("./mbtiles"));
//!
//! for id in store.list() {
//!     println!("{}", id);
//! }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::archive::{is_archive_file, ArchiveOpener, TileArchive};
use crate::error::ArchiveError;

// =============================================================================
// Identifiers
// =============================================================================

/// Separator for datasets discovered by the start-up scan.
pub const DISCOVERED_SEPARATOR: char = '!';

/// Separator for datasets created by an upload.
pub const UPLOADED_SEPARATOR: char = '#';

/// Identifier for an archive found on disk at start-up.
///
/// The base name is the file name up to its first `.`.
pub fn discovered_id(file_name: &str, timestamp_millis: u128) -> String {
    let base = file_name.split('.').next().unwrap_or(file_name);
    format!("{}{}{}", base, DISCOVERED_SEPARATOR, timestamp_millis)
}

/// Identifier for an uploaded archive.
pub fn uploaded_id(name: &str, timestamp_millis: u128) -> String {
    format!("{}{}{}", name, UPLOADED_SEPARATOR, timestamp_millis)
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

// =============================================================================
// Dataset
// =============================================================================

/// A loaded archive and the identifier it is registered under.
pub struct Dataset<A> {
    id: String,
    archive: A,
}

impl<A: TileArchive> Dataset<A> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }
}

/// Outcome of [`DatasetStore::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The dataset is now in the table
    Registered,
    /// The identifier was taken; the offered handle was closed
    AlreadyPresent,
}

/// Outcome of [`DatasetStore::evict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    Evicted,
    AlreadyAbsent,
}

// =============================================================================
// DatasetStore
// =============================================================================

/// Concurrent registry of open tile archives.
pub struct DatasetStore<O: ArchiveOpener> {
    /// Opens archive files for scan and ingestion
    opener: O,

    /// Loaded datasets indexed by identifier
    datasets: DashMap<String, Arc<Dataset<O::Archive>>>,
}

impl<O: ArchiveOpener> DatasetStore<O> {
    /// Create an empty store.
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            datasets: DashMap::new(),
        }
    }

    /// The opener used for new archives.
    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Load every archive file found directly in `dir`.
    ///
    /// Files that fail to open are logged and skipped. A missing directory
    /// loads nothing. Returns the number of datasets registered.
    pub fn scan(&self, dir: &Path) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(dir = %dir.display(), "Archive directory does not exist yet, nothing to load");
                return 0;
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot read archive directory");
                return 0;
            }
        };

        let mut loaded = 0;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Cannot read directory entry");
                    continue;
                }
            };

            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !path.is_file() || !is_archive_file(&file_name) {
                continue;
            }

            let id = discovered_id(&file_name, now_millis());
            match self.load(&id, &path) {
                Ok(Registration::Registered) => loaded += 1,
                Ok(Registration::AlreadyPresent) => {
                    warn!(dataset_id = %id, path = %path.display(), "Identifier collision, archive skipped");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable archive");
                }
            }
        }

        info!(dir = %dir.display(), count = loaded, "Scan complete");
        loaded
    }

    /// Open the archive at `path` and register it under `id`.
    pub fn load(&self, id: &str, path: &Path) -> Result<Registration, ArchiveError> {
        let archive = self.opener.open(path)?;
        Ok(self.register(id, archive))
    }

    /// Insert `archive` under `id` unless the identifier is already taken.
    ///
    /// When the identifier is taken the existing entry is kept and `archive`
    /// is closed.
    pub fn register(&self, id: impl Into<String>, archive: O::Archive) -> Registration {
        match self.datasets.entry(id.into()) {
            Entry::Occupied(entry) => {
                let id = entry.key().clone();
                drop(entry);

                if let Err(e) = archive.close() {
                    warn!(dataset_id = %id, error = %e, "Failed to close rejected archive");
                }
                debug!(dataset_id = %id, "Identifier already registered");
                Registration::AlreadyPresent
            }
            Entry::Vacant(entry) => {
                info!(
                    dataset_id = %entry.key(),
                    path = %archive.path().display(),
                    "Registered dataset"
                );
                let dataset = Arc::new(Dataset {
                    id: entry.key().clone(),
                    archive,
                });
                entry.insert(dataset);
                Registration::Registered
            }
        }
    }

    /// Identifiers of all loaded datasets, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.datasets.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Look up a dataset.
    pub fn get(&self, id: &str) -> Option<Arc<Dataset<O::Archive>>> {
        self.datasets.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.datasets.contains_key(id)
    }

    /// All loaded datasets ordered by identifier.
    ///
    /// The handles are collected before returning so callers never hold a
    /// shard lock while reading from an archive.
    pub fn snapshot(&self) -> Vec<Arc<Dataset<O::Archive>>> {
        let mut datasets: Vec<_> = self.datasets.iter().map(|e| Arc::clone(e.value())).collect();
        datasets.sort_by(|a, b| a.id.cmp(&b.id));
        datasets
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Remove a dataset and close its archive.
    ///
    /// A close failure is logged; the dataset is gone from the table either way.
    pub fn evict(&self, id: &str) -> Eviction {
        match self.datasets.remove(id) {
            Some((_, dataset)) => {
                if let Err(e) = dataset.archive.close() {
                    warn!(dataset_id = %id, error = %e, "Archive did not close cleanly");
                }
                info!(dataset_id = %id, "Evicted dataset");
                Eviction::Evicted
            }
            None => {
                debug!(dataset_id = %id, "Dataset already absent");
                Eviction::AlreadyAbsent
            }
        }
    }

    /// Evict every dataset. Returns how many were removed.
    pub fn evict_all(&self) -> usize {
        let evicted = self
            .list()
            .iter()
            .filter(|id| self.evict(id) == Eviction::Evicted)
            .count();
        info!(count = evicted, "Evicted all datasets");
        evicted
    }
}

// =============================================================================
// Tests
// =============================================================================
