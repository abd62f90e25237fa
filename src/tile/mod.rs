//! Tile resolution and dataset metadata.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └──────────┬──────────────────┬───────────┘
//!            │                  │
//!            ▼                  ▼
//! ┌──────────────────┐ ┌──────────────────────┐
//! │   TileService    │ │  MetadataProjector   │
//! │ (named / any)    │ │  (defaults per field)│
//! └────────┬─────────┘ └──────────┬───────────┘
//!          │                      │
//!          ▼                      ▼
//! ┌─────────────────────────────────────────┐
//! │              DatasetStore               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Both components perform blocking archive reads.

mod metadata;
mod service;

pub use metadata::{
    ArchiveMetadata, DatasetMetadata, MetadataProjector, DEFAULT_ATTRIBUTION, DEFAULT_BOUND,
    DEFAULT_NAME, DEFAULT_TILESET_NAME, DEFAULT_TILE_MIME_TYPE, UNKNOWN_ZOOM,
};
pub use service::{DatasetSelector, TileCoord, TileResponse, TileService, FALLBACK_MIME_TYPE};
