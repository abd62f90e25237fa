use thiserror::Error;

/// Errors raised by a tile archive reader.
///
/// A missing tile is not an error: readers report it as `Ok(None)`.
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// The file could not be opened as a tile archive
    #[error("Cannot open archive {path}: {message}")]
    Open { path: String, message: String },

    /// A query against an open archive failed
    #[error("Archive read failed: {0}")]
    Read(String),

    /// A metadata row exists but its value cannot be interpreted
    #[error("Invalid metadata value for '{key}': {value}")]
    InvalidMetadata { key: &'static str, value: String },

    /// The archive handle has already been closed
    #[error("Archive is closed")]
    Closed,

    /// Closing the underlying file failed
    #[error("Failed to close archive: {0}")]
    Close(String),
}

impl From<rusqlite::Error> for ArchiveError {
    fn from(err: rusqlite::Error) -> Self {
        ArchiveError::Read(err.to_string())
    }
}

/// Errors from tile resolution and metadata projection.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// One or more coordinates are negative or beyond 32 bits
    #[error("Invalid tile coordinate z={z}, x={x}, y={y}: coordinates must be non-negative 32-bit integers")]
    InvalidCoordinate { z: i64, x: i64, y: i64 },

    /// No dataset is registered under this identifier
    #[error("Dataset not found: {dataset_id}")]
    DatasetNotFound { dataset_id: String },

    /// The dataset (or every dataset, in fallback mode) has no tile here
    #[error("Tile not found at z={z}, x={x}, y={y}{}", in_dataset(.dataset_id))]
    TileNotFound {
        z: u32,
        x: u32,
        y: u32,
        dataset_id: Option<String>,
    },

    /// The archive failed while serving the request
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Unexpected fault outside the error taxonomy
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn in_dataset(dataset_id: &Option<String>) -> String {
    dataset_id
        .as_ref()
        .map(|id| format!(" in dataset {}", id))
        .unwrap_or_default()
}

/// Errors from the upload ingestion path.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    /// Declared upload size is above the configured maximum
    #[error("File size {size} bytes exceeds limit of {limit} bytes")]
    SizeLimitExceeded { size: u64, limit: u64 },

    /// Uploaded file name does not carry the archive suffix
    #[error("Invalid file format: '{file_name}' is not an .mbtiles file")]
    InvalidFormat { file_name: String },

    /// Dataset name is blank or would escape the storage directory
    #[error("Invalid dataset name: '{name}'")]
    InvalidName { name: String },

    /// Storage directory does not exist and cannot be created
    #[error("Storage directory {path} unavailable: {message}")]
    StorageUnavailable { path: String, message: String },

    /// Upload could not be written completely to disk
    #[error("Failed to save file {path}: {message}")]
    PersistFailure { path: String, message: String },

    /// The persisted file is not a readable archive
    #[error("Uploaded file is not a valid archive: {0}")]
    ArchiveOpen(ArchiveError),

    /// Another dataset already holds this identifier
    #[error("Dataset identifier already in use: {dataset_id}")]
    DuplicateIdentifier { dataset_id: String },

    /// Unexpected fault outside the error taxonomy
    #[error("Internal error: {message}")]
    Internal { message: String },
}
