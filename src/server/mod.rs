//! HTTP server layer for MBTiles Streamer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        GET /api/v1/mbtiles/{mapName}/{z}/{x}/{y}                │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (requests, error → JSON) │  │ (router, CORS, body limit)  │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    evict_handler, health_handler, list_handler, metadata_handler, named_tile_handler,
    tile_handler, upload_handler, AppState, DatasetQueryParams, ErrorResponse, HandlerError,
    HealthResponse, MetadataError, UploadError, DATASET_ID_HEADER, UPLOAD_FILE_FIELD,
    UPLOAD_NAME_FIELD,
};
pub use routes::{create_router, RouterConfig, API_PREFIX, DEFAULT_MAX_FILE_SIZE_MIB};
