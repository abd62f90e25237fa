//! TileArchive trait for format-agnostic archive access.
//!
//! The registry never touches archive files directly. Everything it needs
//! (tile bytes, descriptive metadata, closing) goes through [`TileArchive`],
//! and new archives are produced by an [`ArchiveOpener`].

use std::path::Path;

use bytes::Bytes;

use crate::error::ArchiveError;

// =============================================================================
// Metadata Keys
// =============================================================================

/// Metadata row holding the tileset name.
pub const META_NAME: &str = "name";

/// Metadata row holding the attribution string.
pub const META_ATTRIBUTION: &str = "attribution";

/// Metadata row holding the tile encoding (`png`, `jpg`, `webp`, `pbf`).
pub const META_FORMAT: &str = "format";

/// Metadata row holding `left,bottom,right,top` in WGS84 degrees.
pub const META_BOUNDS: &str = "bounds";

/// Metadata row holding the tileset version.
pub const META_VERSION: &str = "version";

/// Metadata row holding a free-form description.
pub const META_DESCRIPTION: &str = "description";

/// Metadata row holding the lowest zoom level.
pub const META_MIN_ZOOM: &str = "minzoom";

/// Metadata row holding the highest zoom level.
pub const META_MAX_ZOOM: &str = "maxzoom";

// =============================================================================
// Tile Format
// =============================================================================

/// Encoding of the tiles stored in an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Png,
    Jpeg,
    Webp,
    /// Mapbox vector tiles (protobuf)
    Pbf,
}

impl TileFormat {
    /// Parse the value of the `format` metadata row.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Some(TileFormat::Png),
            "jpg" | "jpeg" => Some(TileFormat::Jpeg),
            "webp" => Some(TileFormat::Webp),
            "pbf" | "mvt" => Some(TileFormat::Pbf),
            _ => None,
        }
    }

    /// MIME type used for the `Content-Type` of served tiles.
    pub const fn mime_type(&self) -> &'static str {
        match self {
            TileFormat::Png => "image/png",
            TileFormat::Jpeg => "image/jpeg",
            TileFormat::Webp => "image/webp",
            TileFormat::Pbf => "application/x-protobuf",
        }
    }
}

// =============================================================================
// Bounds
// =============================================================================

/// Geographic extent of a tileset, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Bounds {
    /// Parse the `bounds` metadata row (`left,bottom,right,top`).
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<f64> = value
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;

        match parts.as_slice() {
            [left, bottom, right, top] => Some(Bounds {
                min_lon: *left,
                min_lat: *bottom,
                max_lon: *right,
                max_lat: *top,
            }),
            _ => None,
        }
    }
}

// =============================================================================
// TileArchive Trait
// =============================================================================

/// An open tile archive.
///
/// Implementations must be safe to share between threads; if the underlying
/// storage is not reentrant they serialise access internally.
pub trait TileArchive: Send + Sync {
    /// Path of the file backing this archive.
    fn path(&self) -> &Path;

    /// Read the tile at (z, x, y).
    ///
    /// Returns `Ok(None)` when the archive has no tile at that coordinate.
    fn read_tile(&self, z: u32, x: u32, y: u32) -> Result<Option<Bytes>, ArchiveError>;

    /// Read a raw metadata value by key.
    fn metadata_value(&self, key: &str) -> Result<Option<String>, ArchiveError>;

    /// Lowest and highest zoom levels that hold tiles.
    fn zoom_range(&self) -> Result<Option<(u32, u32)>, ArchiveError>;

    /// Release the underlying file. Further reads fail with [`ArchiveError::Closed`].
    fn close(&self) -> Result<(), ArchiveError>;

    /// Whether [`TileArchive::close`] has been called.
    fn is_closed(&self) -> bool;

    /// Tile encoding declared by the archive.
    fn tile_format(&self) -> Result<Option<TileFormat>, ArchiveError> {
        match self.metadata_value(META_FORMAT)? {
            None => Ok(None),
            Some(value) => TileFormat::parse(&value)
                .map(Some)
                .ok_or(ArchiveError::InvalidMetadata {
                    key: META_FORMAT,
                    value,
                }),
        }
    }

    /// Geographic bounds declared by the archive.
    fn bounds(&self) -> Result<Option<Bounds>, ArchiveError> {
        match self.metadata_value(META_BOUNDS)? {
            None => Ok(None),
            Some(value) => Bounds::parse(&value)
                .map(Some)
                .ok_or(ArchiveError::InvalidMetadata {
                    key: META_BOUNDS,
                    value,
                }),
        }
    }
}

/// Factory for opening archives from files.
pub trait ArchiveOpener: Send + Sync {
    /// The archive type this opener produces.
    type Archive: TileArchive + 'static;

    /// Open the archive stored at `path`.
    ///
    /// Fails with [`ArchiveError::Open`] when the file is not a readable archive.
    fn open(&self, path: &Path) -> Result<Self::Archive, ArchiveError>;
}
