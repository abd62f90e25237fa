//! Router configuration for the MBTiles API.
//!
//! # Route Structure
//!
//! ```text
//! /health                                       - Health check
//! /api/v1/mbtiles                    GET/DELETE - List / evict datasets
//! /api/v1/mbtiles/upload             POST       - Upload an archive
//! /api/v1/mbtiles/{mapName}          GET        - Dataset metadata
//! /api/v1/mbtiles/{z}/{x}/{y}        GET        - Tile from any dataset
//! /api/v1/mbtiles/{mapName}/{z}/{x}/{y} GET     - Tile from one dataset
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mbtiles_streamer::{create_router, DatasetStore, MbtilesOpener, RouterConfig};
//!
//! let store = Arc::new(DatasetStore::new(MbtilesOpener::new()));
//! store.scan("./mbtiles".as_ref());
//!
//! let config = RouterConfig::new("./mbtiles")
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//! let router = create_router(store, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    evict_handler, health_handler, list_handler, metadata_handler, named_tile_handler,
    tile_handler, upload_handler, AppState,
};
use crate::archive::ArchiveOpener;
use crate::dataset::{DatasetStore, BYTES_PER_MIB};

/// Base path of the dataset API.
pub const API_PREFIX: &str = "/api/v1/mbtiles";

/// Default upload limit in MiB.
pub const DEFAULT_MAX_FILE_SIZE_MIB: u64 = 100;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Directory uploaded archives are written to
    pub upload_dir: PathBuf,

    /// Largest accepted upload, in MiB
    pub max_file_size_mib: u64,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a configuration storing uploads in `upload_dir`.
    ///
    /// By default:
    /// - Uploads are limited to 100 MiB
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_file_size_mib: DEFAULT_MAX_FILE_SIZE_MIB,
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
        }
    }

    pub fn with_max_file_size_mib(mut self, mib: u64) -> Self {
        self.max_file_size_mib = mib;
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Request body limit for the upload route.
    ///
    /// One extra MiB leaves room for the multipart framing, so files just
    /// over the limit still reach the size check and get a JSON error.
    pub fn upload_body_limit(&self) -> usize {
        let bytes = self
            .max_file_size_mib
            .saturating_add(1)
            .saturating_mul(BYTES_PER_MIB);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router over `store`.
pub fn create_router<O>(store: Arc<DatasetStore<O>>, config: RouterConfig) -> Router
where
    O: ArchiveOpener + 'static,
{
    let state = AppState::new(store, config.upload_dir.clone(), config.max_file_size_mib)
        .with_cache_max_age(config.cache_max_age);

    let cors = build_cors_layer(&config);

    // Tile and metadata paths share positional segments, so a dataset name
    // and a zoom level occupy the same slot.
    let router = Router::new()
        .route("/health", get(health_handler::<O>))
        .route(
            API_PREFIX,
            get(list_handler::<O>).delete(evict_handler::<O>),
        )
        .route(
            &format!("{}/upload", API_PREFIX),
            post(upload_handler::<O>).layer(DefaultBodyLimit::max(config.upload_body_limit())),
        )
        .route(
            &format!("{}/{{first}}", API_PREFIX),
            get(metadata_handler::<O>),
        )
        .route(
            &format!("{}/{{first}}/{{second}}/{{third}}", API_PREFIX),
            get(tile_handler::<O>),
        )
        .route(
            &format!("{}/{{first}}/{{second}}/{{third}}/{{fourth}}", API_PREFIX),
            get(named_tile_handler::<O>),
        )
        .with_state(state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
