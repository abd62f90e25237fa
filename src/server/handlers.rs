//! HTTP request handlers for the MBTiles API.
//!
//! # Endpoints
//!
//! - `GET /api/v1/mbtiles` - List dataset identifiers
//! - `DELETE /api/v1/mbtiles[?mapName=]` - Evict one or all datasets
//! - `POST /api/v1/mbtiles/upload` - Upload an archive
//! - `GET /api/v1/mbtiles/{mapName}` - Dataset metadata
//! - `GET /api/v1/mbtiles/{z}/{x}/{y}[?mapName=]` - Serve a tile
//! - `GET /api/v1/mbtiles/{mapName}/{z}/{x}/{y}` - Serve a tile from one dataset
//! - `GET /health` - Health check

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::archive::ArchiveOpener;
use crate::dataset::{DatasetStore, Eviction, IngestGate, Upload};
use crate::error::{IngestError, TileError};
use crate::tile::{
    DatasetMetadata, DatasetSelector, MetadataProjector, TileService, FALLBACK_MIME_TYPE,
};

/// Header naming the dataset that served a tile (or received an upload).
pub const DATASET_ID_HEADER: &str = "x-dataset-id";

/// Multipart field carrying the dataset name.
pub const UPLOAD_NAME_FIELD: &str = "mapName";

/// Multipart field carrying the archive file.
pub const UPLOAD_FILE_FIELD: &str = "file";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state passed to all handlers.
pub struct AppState<O: ArchiveOpener> {
    /// The dataset table
    pub store: Arc<DatasetStore<O>>,

    /// Tile lookups over the store
    pub tile_service: Arc<TileService<O>>,

    /// Metadata records over the store
    pub projector: Arc<MetadataProjector<O>>,

    /// Upload validation and registration
    pub ingest: Arc<IngestGate<O>>,

    /// Cache-Control max-age for tiles, in seconds
    pub cache_max_age: u32,
}

impl<O: ArchiveOpener + 'static> AppState<O> {
    /// Build the state around `store`, storing uploads in `upload_dir`.
    pub fn new(
        store: Arc<DatasetStore<O>>,
        upload_dir: impl Into<PathBuf>,
        max_file_size_mib: u64,
    ) -> Self {
        Self {
            tile_service: Arc::new(TileService::new(Arc::clone(&store))),
            projector: Arc::new(MetadataProjector::new(Arc::clone(&store))),
            ingest: Arc::new(IngestGate::new(
                Arc::clone(&store),
                upload_dir,
                max_file_size_mib,
            )),
            store,
            cache_max_age: 3600,
        }
    }

    pub fn with_cache_max_age(mut self, cache_max_age: u32) -> Self {
        self.cache_max_age = cache_max_age;
        self
    }
}

impl<O: ArchiveOpener> Clone for AppState<O> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            tile_service: Arc::clone(&self.tile_service),
            projector: Arc::clone(&self.projector),
            ingest: Arc::clone(&self.ingest),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Optional `?mapName=` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct DatasetQueryParams {
    #[serde(rename = "mapName", default)]
    pub map_name: Option<String>,
}

impl DatasetQueryParams {
    fn selector(&self) -> DatasetSelector {
        DatasetSelector::from_param(self.map_name.as_deref())
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "dataset_not_found", "invalid_format")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Number of loaded datasets
    pub datasets: usize,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Log an error by severity and render it as JSON.
fn error_response(status: StatusCode, error_type: &str, message: String) -> Response {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }

    let body = ErrorResponse::with_status(error_type, message, status);
    (status, Json(body)).into_response()
}

fn join_error(err: tokio::task::JoinError) -> TileError {
    TileError::Internal {
        message: format!("blocking task failed: {}", err),
    }
}

/// Convert TileError to an HTTP response for the tile endpoints.
///
/// Request problems (bad coordinates, unknown dataset, missing tile) are
/// 400; archive and internal faults are 500.
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            TileError::InvalidCoordinate { .. } => (StatusCode::BAD_REQUEST, "invalid_coordinate"),
            TileError::DatasetNotFound { .. } => (StatusCode::BAD_REQUEST, "dataset_not_found"),
            TileError::TileNotFound { .. } => (StatusCode::BAD_REQUEST, "tile_not_found"),
            TileError::Archive(_) => (StatusCode::INTERNAL_SERVER_ERROR, "archive_error"),
            TileError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        error_response(status, error_type, self.to_string())
    }
}

/// Wrapper for tile and listing handler errors.
pub struct HandlerError(pub TileError);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

impl From<TileError> for HandlerError {
    fn from(err: TileError) -> Self {
        HandlerError(err)
    }
}

/// Wrapper for metadata errors: an unknown dataset is 404 here.
pub struct MetadataError(pub TileError);

impl IntoResponse for MetadataError {
    fn into_response(self) -> Response {
        let err = self.0;
        if matches!(err, TileError::DatasetNotFound { .. }) {
            error_response(StatusCode::NOT_FOUND, "dataset_not_found", err.to_string())
        } else {
            err.into_response()
        }
    }
}

impl From<TileError> for MetadataError {
    fn from(err: TileError) -> Self {
        MetadataError(err)
    }
}

/// Errors from the upload endpoint.
pub enum UploadError {
    /// The gate rejected the upload
    Ingest(IngestError),

    /// The multipart body could not be read
    Multipart(MultipartError),

    /// A required multipart field was not sent
    MissingField(&'static str),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match self {
            UploadError::Ingest(err) => {
                let (status, error_type) = match &err {
                    IngestError::SizeLimitExceeded { .. } => {
                        (StatusCode::BAD_REQUEST, "size_limit_exceeded")
                    }
                    IngestError::InvalidFormat { .. } => (StatusCode::BAD_REQUEST, "invalid_format"),
                    IngestError::InvalidName { .. } => (StatusCode::BAD_REQUEST, "invalid_name"),
                    IngestError::StorageUnavailable { .. } => {
                        (StatusCode::BAD_REQUEST, "storage_unavailable")
                    }
                    IngestError::PersistFailure { .. } => (StatusCode::BAD_REQUEST, "persist_failure"),
                    IngestError::ArchiveOpen(_) => (StatusCode::BAD_REQUEST, "invalid_archive"),
                    IngestError::DuplicateIdentifier { .. } => {
                        (StatusCode::CONFLICT, "duplicate_identifier")
                    }
                    IngestError::Internal { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                    }
                };
                error_response(status, error_type, err.to_string())
            }
            UploadError::Multipart(err) => {
                error_response(err.status(), "invalid_multipart", err.body_text())
            }
            UploadError::MissingField(field) => error_response(
                StatusCode::BAD_REQUEST,
                "missing_field",
                format!("Missing multipart field '{}'", field),
            ),
        }
    }
}

impl From<IngestError> for UploadError {
    fn from(err: IngestError) -> Self {
        UploadError::Ingest(err)
    }
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        UploadError::Multipart(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Serve a tile, from the `?mapName=` dataset if given or from any dataset.
///
/// # Endpoint
///
/// `GET /api/v1/mbtiles/{z}/{x}/{y}`
///
/// # Response
///
/// - `200 OK`: tile bytes with the dataset's `Content-Type`
/// - `400 Bad Request`: negative coordinates, unknown dataset or missing tile
/// - `500 Internal Server Error`: archive read failure
///
/// # Headers
///
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Dataset-Id: {serving dataset}`
pub async fn tile_handler<O: ArchiveOpener + 'static>(
    State(state): State<AppState<O>>,
    Path((z, x, y)): Path<(i64, i64, i64)>,
    Query(query): Query<DatasetQueryParams>,
) -> Result<Response, HandlerError> {
    serve_tile(&state, query.selector(), z, x, y).await
}

/// Serve a tile from the dataset named in the path.
///
/// `GET /api/v1/mbtiles/{mapName}/{z}/{x}/{y}`
pub async fn named_tile_handler<O: ArchiveOpener + 'static>(
    State(state): State<AppState<O>>,
    Path((map_name, z, x, y)): Path<(String, i64, i64, i64)>,
) -> Result<Response, HandlerError> {
    serve_tile(&state, DatasetSelector::Named(map_name), z, x, y).await
}

async fn serve_tile<O: ArchiveOpener + 'static>(
    state: &AppState<O>,
    selector: DatasetSelector,
    z: i64,
    x: i64,
    y: i64,
) -> Result<Response, HandlerError> {
    let service = Arc::clone(&state.tile_service);
    let tile = tokio::task::spawn_blocking(move || service.resolve(&selector, z, x, y))
        .await
        .map_err(join_error)??;

    let content_type = HeaderValue::from_str(&tile.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static(FALLBACK_MIME_TYPE));

    let mut response = Response::new(Body::from(tile.data));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", state.cache_max_age)) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&tile.dataset_id) {
        headers.insert(DATASET_ID_HEADER, value);
    }

    Ok(response)
}

/// List the identifiers of all loaded datasets.
///
/// `GET /api/v1/mbtiles` returns a sorted JSON array of strings.
pub async fn list_handler<O: ArchiveOpener + 'static>(
    State(state): State<AppState<O>>,
) -> Json<Vec<String>> {
    Json(state.store.list())
}

/// Describe one dataset.
///
/// # Endpoint
///
/// `GET /api/v1/mbtiles/{mapName}`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "name": "Town",
///   "attribution": "no attribution",
///   "tileSetName": "Town",
///   "tileMimeType": "image/png",
///   "minZoom": 0,
///   "maxZoom": 14,
///   "minLon": 13.1,
///   "maxLon": 13.7,
///   "minLat": 52.3,
///   "maxLat": 52.7,
///   "version": "1.0",
///   "description": null
/// }
/// ```
///
/// `404 Not Found` if no dataset has this identifier.
pub async fn metadata_handler<O: ArchiveOpener + 'static>(
    State(state): State<AppState<O>>,
    Path(map_name): Path<String>,
) -> Result<Json<DatasetMetadata>, MetadataError> {
    let projector = Arc::clone(&state.projector);
    let metadata = tokio::task::spawn_blocking(move || projector.describe(&map_name))
        .await
        .map_err(join_error)??;

    Ok(Json(metadata))
}

/// Evict one dataset (`?mapName=`) or all of them.
///
/// `DELETE /api/v1/mbtiles` always answers `204 No Content`; evicting an
/// unknown dataset is a no-op.
pub async fn evict_handler<O: ArchiveOpener + 'static>(
    State(state): State<AppState<O>>,
    Query(query): Query<DatasetQueryParams>,
) -> Result<StatusCode, HandlerError> {
    let store = Arc::clone(&state.store);

    match query.selector() {
        DatasetSelector::Named(id) => {
            let outcome = tokio::task::spawn_blocking(move || store.evict(&id))
                .await
                .map_err(join_error)?;
            if outcome == Eviction::AlreadyAbsent {
                debug!("Evict request for a dataset that is not loaded");
            }
        }
        DatasetSelector::Any => {
            tokio::task::spawn_blocking(move || store.evict_all())
                .await
                .map_err(join_error)?;
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Upload an archive as a new dataset.
///
/// # Endpoint
///
/// `POST /api/v1/mbtiles/upload` with multipart fields `mapName` (text)
/// and `file` (the `.mbtiles` archive).
///
/// # Response
///
/// - `200 OK`: empty body; `X-Dataset-Id` carries the new identifier
/// - `400 Bad Request`: missing field, oversized file, wrong suffix,
///   invalid name, unreadable archive or storage failure
/// - `409 Conflict`: identifier already in use
pub async fn upload_handler<O: ArchiveOpener + 'static>(
    State(state): State<AppState<O>>,
    mut multipart: Multipart,
) -> Result<Response, UploadError> {
    let mut name = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(UPLOAD_NAME_FIELD) => name = Some(field.text().await?),
            Some(UPLOAD_FILE_FIELD) => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                file = Some((file_name, data));
            }
            other => warn!(field = ?other, "Ignoring unexpected multipart field"),
        }
    }

    let name = name.ok_or(UploadError::MissingField(UPLOAD_NAME_FIELD))?;
    let (file_name, data) = file.ok_or(UploadError::MissingField(UPLOAD_FILE_FIELD))?;

    let id = state
        .ingest
        .ingest(Upload {
            name,
            file_name,
            size: data.len() as u64,
            body: &data[..],
        })
        .await?;

    let mut response = StatusCode::OK.into_response();
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(DATASET_ID_HEADER, value);
    }
    Ok(response)
}

/// Handle health check requests.
///
/// `GET /health` returns `{"status": "healthy", "version": "...", "datasets": N}`.
pub async fn health_handler<O: ArchiveOpener + 'static>(
    State(state): State<AppState<O>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        datasets: state.store.len(),
    })
}

// =============================================================================
// Tests
// =============================================================================
