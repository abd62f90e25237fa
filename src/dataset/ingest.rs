//! Ingestion Gate: turns an uploaded archive into a registered dataset.
//!
//! Every check that can reject an upload runs before a byte is written, so a
//! rejected upload leaves nothing in the storage directory. Once writing
//! starts, any failure removes the partial file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::OpenOptions;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{info, warn};

use crate::archive::{is_archive_file, ArchiveOpener, ARCHIVE_SUFFIX};
use crate::error::IngestError;

use super::store::{now_millis, uploaded_id, DatasetStore, Registration};

/// Bytes in one mebibyte; upload limits are configured in MiB.
pub const BYTES_PER_MIB: u64 = 1024 * 1024;

/// An uploaded archive waiting to be ingested.
pub struct Upload<R> {
    /// Logical dataset name chosen by the user
    pub name: String,

    /// Original file name, used only for suffix validation
    pub file_name: String,

    /// Declared size of `body` in bytes
    pub size: u64,

    /// The archive bytes
    pub body: R,
}

/// Validates, persists and registers uploaded archives.
pub struct IngestGate<O: ArchiveOpener> {
    store: Arc<DatasetStore<O>>,
    storage_dir: PathBuf,
    max_size_bytes: u64,
}

impl<O: ArchiveOpener + 'static> IngestGate<O> {
    /// Create a gate writing into `storage_dir` and accepting uploads up to
    /// `max_size_mib` mebibytes.
    pub fn new(store: Arc<DatasetStore<O>>, storage_dir: impl Into<PathBuf>, max_size_mib: u64) -> Self {
        Self {
            store,
            storage_dir: storage_dir.into(),
            max_size_bytes: max_size_mib.saturating_mul(BYTES_PER_MIB),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Persist and register an uploaded archive.
    ///
    /// Returns the identifier (`<name>#<millis>`) of the new dataset.
    pub async fn ingest<R>(&self, upload: Upload<R>) -> Result<String, IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let Upload {
            name,
            file_name,
            size,
            mut body,
        } = upload;

        if size > self.max_size_bytes {
            return Err(IngestError::SizeLimitExceeded {
                size,
                limit: self.max_size_bytes,
            });
        }

        if !is_archive_file(&file_name) {
            return Err(IngestError::InvalidFormat { file_name });
        }

        validate_name(&name)?;

        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .map_err(|e| IngestError::StorageUnavailable {
                path: self.storage_dir.display().to_string(),
                message: e.to_string(),
            })?;

        let id = uploaded_id(&name, now_millis());
        let path = self.storage_dir.join(format!("{}{}", id, ARCHIVE_SUFFIX));

        self.persist(&id, &path, size, &mut body).await?;
        self.register_persisted(id, path, size).await
    }

    /// Open the persisted file at `path` and register it under `id`.
    ///
    /// The file is removed if it cannot be registered. It was created
    /// exclusively by this upload, so it is never another dataset's file.
    async fn register_persisted(&self, id: String, path: PathBuf, size: u64) -> Result<String, IngestError> {
        let store = Arc::clone(&self.store);
        let (load_id, load_path) = (id.clone(), path.clone());
        let loaded = tokio::task::spawn_blocking(move || store.load(&load_id, &load_path))
            .await
            .map_err(|e| IngestError::Internal {
                message: e.to_string(),
            })?;

        match loaded {
            Ok(Registration::Registered) => {
                info!(dataset_id = %id, path = %path.display(), bytes = size, "Ingested upload");
                Ok(id)
            }
            Ok(Registration::AlreadyPresent) => {
                remove_quietly(&path).await;
                Err(IngestError::DuplicateIdentifier { dataset_id: id })
            }
            Err(e) => {
                remove_quietly(&path).await;
                Err(IngestError::ArchiveOpen(e))
            }
        }
    }

    /// Write `body` to a new file at `path`, verifying the byte count.
    async fn persist<R>(&self, id: &str, path: &Path, size: u64, body: &mut R) -> Result<(), IngestError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let persist_failure = |message: String| IngestError::PersistFailure {
            path: path.display().to_string(),
            message,
        };

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(IngestError::DuplicateIdentifier {
                    dataset_id: id.to_string(),
                });
            }
            Err(e) => return Err(persist_failure(e.to_string())),
        };

        let written = async {
            let written = tokio::io::copy(body, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;
        drop(file);

        let failure = match written {
            Ok(written) if written == size => None,
            Ok(written) => Some(format!("wrote {} of {} declared bytes", written, size)),
            Err(e) => Some(e.to_string()),
        };
        if let Some(message) = failure {
            remove_quietly(path).await;
            return Err(persist_failure(message));
        }

        match tokio::fs::try_exists(path).await {
            Ok(true) => Ok(()),
            _ => Err(persist_failure("file missing after write".to_string())),
        }
    }
}

/// Reject names that are blank, contain `..` or a path separator.
fn validate_name(name: &str) -> Result<(), IngestError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name.contains("..")
        || name.contains(['/', '\\', '\0']);

    if invalid {
        Err(IngestError::InvalidName {
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove rejected upload");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
