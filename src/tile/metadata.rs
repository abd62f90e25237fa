//! Metadata projection for loaded datasets.
//!
//! Each descriptive field is read independently. A missing or unreadable
//! field falls back to its default without affecting the others.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::archive::{
    ArchiveOpener, Bounds, TileArchive, TileFormat, META_ATTRIBUTION, META_DESCRIPTION,
    META_NAME, META_VERSION,
};
use crate::dataset::DatasetStore;
use crate::error::{ArchiveError, TileError};

pub const DEFAULT_NAME: &str = "unnamed dataset";
pub const DEFAULT_ATTRIBUTION: &str = "no attribution";
pub const DEFAULT_TILESET_NAME: &str = "unnamed tileset";
pub const DEFAULT_TILE_MIME_TYPE: &str = "";

/// Zoom level reported when an archive has no tiles and no zoom metadata.
pub const UNKNOWN_ZOOM: i64 = -1;

/// Bound reported when an archive has no usable `bounds` row.
pub const DEFAULT_BOUND: f64 = 0.0;

/// Descriptive fields as read from an archive; `None` means absent or unreadable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveMetadata {
    pub name: Option<String>,
    pub attribution: Option<String>,
    pub tile_format: Option<TileFormat>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub zoom_range: Option<(u32, u32)>,
    pub bounds: Option<Bounds>,
}

impl ArchiveMetadata {
    /// Read every field from `archive`, tolerating per-field failures.
    pub fn read<A: TileArchive>(archive: &A) -> Self {
        Self {
            name: field(META_NAME, archive.metadata_value(META_NAME)),
            attribution: field(META_ATTRIBUTION, archive.metadata_value(META_ATTRIBUTION)),
            tile_format: field("format", archive.tile_format()),
            version: field(META_VERSION, archive.metadata_value(META_VERSION)),
            description: field(META_DESCRIPTION, archive.metadata_value(META_DESCRIPTION)),
            zoom_range: field("zoom range", archive.zoom_range()),
            bounds: field("bounds", archive.bounds()),
        }
    }
}

fn field<T>(name: &str, value: Result<Option<T>, ArchiveError>) -> Option<T> {
    value.unwrap_or_else(|e| {
        debug!(field = name, error = %e, "Metadata field unavailable, using default");
        None
    })
}

/// Public description of a dataset, serialized for the metadata endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    pub name: String,
    pub attribution: String,
    pub tile_set_name: String,
    pub tile_mime_type: String,
    pub min_zoom: i64,
    pub max_zoom: i64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
    pub version: Option<String>,
    pub description: Option<String>,
}

impl From<ArchiveMetadata> for DatasetMetadata {
    fn from(raw: ArchiveMetadata) -> Self {
        let (min_zoom, max_zoom) = raw
            .zoom_range
            .map(|(min, max)| (i64::from(min), i64::from(max)))
            .unwrap_or((UNKNOWN_ZOOM, UNKNOWN_ZOOM));

        let bounds = raw.bounds.unwrap_or(Bounds {
            min_lon: DEFAULT_BOUND,
            min_lat: DEFAULT_BOUND,
            max_lon: DEFAULT_BOUND,
            max_lat: DEFAULT_BOUND,
        });

        Self {
            name: raw.name.clone().unwrap_or_else(|| DEFAULT_NAME.to_string()),
            attribution: raw
                .attribution
                .unwrap_or_else(|| DEFAULT_ATTRIBUTION.to_string()),
            tile_set_name: raw
                .name
                .unwrap_or_else(|| DEFAULT_TILESET_NAME.to_string()),
            tile_mime_type: raw
                .tile_format
                .map(|f| f.mime_type().to_string())
                .unwrap_or_else(|| DEFAULT_TILE_MIME_TYPE.to_string()),
            min_zoom,
            max_zoom,
            min_lon: bounds.min_lon,
            max_lon: bounds.max_lon,
            min_lat: bounds.min_lat,
            max_lat: bounds.max_lat,
            version: raw.version,
            description: raw.description,
        }
    }
}

/// Builds [`DatasetMetadata`] for loaded datasets.
pub struct MetadataProjector<O: ArchiveOpener> {
    store: Arc<DatasetStore<O>>,
}

impl<O: ArchiveOpener> MetadataProjector<O> {
    pub fn new(store: Arc<DatasetStore<O>>) -> Self {
        Self { store }
    }

    /// Describe the dataset `id`.
    ///
    /// Fails only with [`TileError::DatasetNotFound`], including when the
    /// dataset is evicted while its fields are read. Unreadable fields take
    /// their defaults.
    pub fn describe(&self, id: &str) -> Result<DatasetMetadata, TileError> {
        let not_found = || TileError::DatasetNotFound {
            dataset_id: id.to_string(),
        };
        let dataset = self.store.get(id).ok_or_else(not_found)?;

        let raw = ArchiveMetadata::read(dataset.archive());
        if dataset.archive().is_closed() {
            debug!(dataset_id = %id, "Dataset closed while reading metadata");
            return Err(not_found());
        }

        Ok(raw.into())
    }
}
