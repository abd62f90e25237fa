//! Tile archive access.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     DatasetStore / TileService          │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │  TileArchive + ArchiveOpener traits     │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │  MbtilesArchive (SQLite via rusqlite)   │
//! └─────────────────────────────────────────┘
//! ```

#[cfg(test)]
pub(crate) mod memory;
mod mbtiles;
mod reader;

pub use mbtiles::{is_archive_file, MbtilesArchive, MbtilesOpener, ARCHIVE_SUFFIX};
pub use reader::{
    ArchiveOpener, Bounds, TileArchive, TileFormat, META_ATTRIBUTION, META_BOUNDS,
    META_DESCRIPTION, META_FORMAT, META_MAX_ZOOM, META_MIN_ZOOM, META_NAME, META_VERSION,
};
