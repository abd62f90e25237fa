//! # MBTiles Streamer
//!
//! A tile server for MBTiles archives.
//!
//! Archives are loaded from a directory at startup or uploaded over HTTP.
//! Each loaded archive becomes a *dataset* with a unique identifier, and
//! tiles are served either from a named dataset or from the first dataset
//! that has the requested tile.
//!
//! ## Architecture
//!
//! - [`archive`] - `TileArchive` trait and the SQLite-backed MBTiles reader
//! - [`dataset`] - Dataset store (identifier → open archive) and upload ingestion
//! - [`tile`] - Tile resolution and metadata projection
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mbtiles_streamer::{create_router, DatasetStore, MbtilesOpener, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(DatasetStore::new(MbtilesOpener::new()));
//!     store.scan("./mbtiles".as_ref());
//!
//!     let router = create_router(store, RouterConfig::new("./mbtiles"));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod archive;
pub mod config;
pub mod dataset;
pub mod error;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use archive::{ArchiveOpener, Bounds, MbtilesArchive, MbtilesOpener, TileArchive, TileFormat};
pub use config::Config;
pub use dataset::{Dataset, DatasetStore, Eviction, IngestGate, Registration, Upload};
pub use error::{ArchiveError, IngestError, TileError};
pub use server::{create_router, AppState, ErrorResponse, HealthResponse, RouterConfig};
pub use tile::{
    DatasetMetadata, DatasetSelector, MetadataProjector, TileResponse, TileService,
};
