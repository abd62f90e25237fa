//! Tile Service: resolves tile requests against the dataset store.
//!
//! # Resolution
//!
//! ```text
//!  (selector, z, x, y)
//!         │
//!         ▼
//!  validate coordinates ──✗──▶ InvalidCoordinate
//!         │
//!         ├── Named(id) ──▶ store.get(id) ──✗──▶ DatasetNotFound
//!         │                      │
//!         │                      ▼
//!         │               read_tile ──✗──▶ TileNotFound
//!         │
//!         └── Any ──▶ first dataset in snapshot with a tile ──✗──▶ TileNotFound
//! ```
//!
//! Coordinates are always validated before the dataset is looked up.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::archive::{ArchiveOpener, TileArchive};
use crate::dataset::DatasetStore;
use crate::error::{ArchiveError, TileError};

/// Content type for tiles whose archive declares no usable format.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

// =============================================================================
// Request Types
// =============================================================================

/// Which datasets a tile request may be served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSelector {
    /// Only the dataset with this identifier
    Named(String),

    /// The first loaded dataset that has the tile
    Any,
}

impl DatasetSelector {
    /// Build a selector from an optional request parameter.
    ///
    /// A missing or blank parameter selects any dataset.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some(id) if !id.trim().is_empty() => DatasetSelector::Named(id.to_string()),
            _ => DatasetSelector::Any,
        }
    }
}

/// A validated tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCoord {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Validate raw request coordinates.
    ///
    /// Negative values (and values beyond `u32`) fail with
    /// [`TileError::InvalidCoordinate`].
    pub fn new(z: i64, x: i64, y: i64) -> Result<Self, TileError> {
        match (u32::try_from(z), u32::try_from(x), u32::try_from(y)) {
            (Ok(z), Ok(x), Ok(y)) => Ok(TileCoord { z, x, y }),
            _ => Err(TileError::InvalidCoordinate { z, x, y }),
        }
    }
}

// =============================================================================
// Tile Response
// =============================================================================

/// A resolved tile.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// Raw tile bytes as stored in the archive
    pub data: Bytes,

    /// MIME type declared by the serving dataset
    pub mime_type: String,

    /// Identifier of the dataset that served the tile
    pub dataset_id: String,
}

// =============================================================================
// Tile Service
// =============================================================================

/// Resolves tiles from the datasets in a [`DatasetStore`].
///
/// Archive reads block, so async callers should run [`TileService::resolve`]
/// on a blocking thread.
pub struct TileService<O: ArchiveOpener> {
    store: Arc<DatasetStore<O>>,
}

impl<O: ArchiveOpener> TileService<O> {
    pub fn new(store: Arc<DatasetStore<O>>) -> Self {
        Self { store }
    }

    /// The store this service reads from.
    pub fn store(&self) -> &Arc<DatasetStore<O>> {
        &self.store
    }

    /// Resolve a tile request.
    ///
    /// # Errors
    ///
    /// - [`TileError::InvalidCoordinate`] if any coordinate is negative,
    ///   checked before anything else
    /// - [`TileError::DatasetNotFound`] if a named dataset is not loaded, or
    ///   is evicted before its tile is read
    /// - [`TileError::TileNotFound`] if no eligible dataset has the tile
    /// - [`TileError::Archive`] if an archive read fails
    pub fn resolve(
        &self,
        selector: &DatasetSelector,
        z: i64,
        x: i64,
        y: i64,
    ) -> Result<TileResponse, TileError> {
        let coord = TileCoord::new(z, x, y)?;

        match selector {
            DatasetSelector::Named(id) => self.resolve_named(id, coord),
            DatasetSelector::Any => self.resolve_any(coord),
        }
    }

    fn resolve_named(&self, id: &str, coord: TileCoord) -> Result<TileResponse, TileError> {
        let dataset = self
            .store
            .get(id)
            .ok_or_else(|| TileError::DatasetNotFound {
                dataset_id: id.to_string(),
            })?;

        let data = match dataset.archive().read_tile(coord.z, coord.x, coord.y) {
            Ok(Some(data)) => data,
            Ok(None) => {
                return Err(TileError::TileNotFound {
                    z: coord.z,
                    x: coord.x,
                    y: coord.y,
                    dataset_id: Some(id.to_string()),
                })
            }
            // Evicted between the lookup and the read
            Err(ArchiveError::Closed) => {
                debug!(dataset_id = %id, "Dataset closed during tile read");
                return Err(TileError::DatasetNotFound {
                    dataset_id: id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(TileResponse {
            data,
            mime_type: mime_type_of(dataset.id(), dataset.archive()),
            dataset_id: dataset.id().to_string(),
        })
    }

    fn resolve_any(&self, coord: TileCoord) -> Result<TileResponse, TileError> {
        for dataset in self.store.snapshot() {
            match dataset.archive().read_tile(coord.z, coord.x, coord.y) {
                Ok(Some(data)) => {
                    return Ok(TileResponse {
                        data,
                        mime_type: mime_type_of(dataset.id(), dataset.archive()),
                        dataset_id: dataset.id().to_string(),
                    });
                }
                Ok(None) => continue,
                // Evicted after the snapshot was taken
                Err(ArchiveError::Closed) => {
                    debug!(dataset_id = %dataset.id(), "Skipping dataset closed during search");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(TileError::TileNotFound {
            z: coord.z,
            x: coord.x,
            y: coord.y,
            dataset_id: None,
        })
    }
}

/// Read the tile MIME type from the archive metadata.
fn mime_type_of<A: TileArchive>(dataset_id: &str, archive: &A) -> String {
    match archive.tile_format() {
        Ok(Some(format)) => format.mime_type().to_string(),
        Ok(None) => {
            debug!(dataset_id = %dataset_id, "Archive declares no tile format");
            FALLBACK_MIME_TYPE.to_string()
        }
        Err(e) => {
            warn!(dataset_id = %dataset_id, error = %e, "Cannot read tile format");
            FALLBACK_MIME_TYPE.to_string()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
