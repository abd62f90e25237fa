//! SQLite-backed MBTiles reader.
//!
//! An MBTiles file is a SQLite database with a `tiles` table
//! (`zoom_level`, `tile_column`, `tile_row`, `tile_data`) and a `metadata`
//! table of `name`/`value` rows. Only the `tiles` table is required to open
//! the archive; a missing `metadata` table surfaces as a failed metadata read.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use crate::error::ArchiveError;

use super::reader::{ArchiveOpener, TileArchive, META_MAX_ZOOM, META_MIN_ZOOM};

/// File suffix of MBTiles archives.
pub const ARCHIVE_SUFFIX: &str = ".mbtiles";

/// An open MBTiles archive.
///
/// The connection sits behind a mutex because a SQLite connection must not be
/// used from two threads at once. `None` marks a closed archive.
pub struct MbtilesArchive {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl MbtilesArchive {
    /// Open an archive read-only and verify it has a `tiles` table.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let open_error = |message: String| ArchiveError::Open {
            path: path.display().to_string(),
            message,
        };

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| open_error(e.to_string()))?;

        // SQLite reads the header lazily; this query rejects non-database files.
        let has_tiles: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master \
                 WHERE name = 'tiles' AND type IN ('table', 'view'))",
                [],
                |row| row.get(0),
            )
            .map_err(|e| open_error(e.to_string()))?;

        if !has_tiles {
            return Err(open_error("missing 'tiles' table".to_string()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, ArchiveError> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(ArchiveError::Closed)?;
        Ok(f(conn)?)
    }

    fn metadata_zoom(&self, key: &'static str) -> Result<Option<u32>, ArchiveError> {
        match self.metadata_value(key)? {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ArchiveError::InvalidMetadata { key, value }),
        }
    }
}

impl TileArchive for MbtilesArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_tile(&self, z: u32, x: u32, y: u32) -> Result<Option<Bytes>, ArchiveError> {
        let data = self.with_conn(|conn| {
            conn.query_row(
                "SELECT tile_data FROM tiles \
                 WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
                params![z, x, y],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
        })?;

        Ok(data.map(Bytes::from))
    }

    fn metadata_value(&self, key: &str) -> Result<Option<String>, ArchiveError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM metadata WHERE name = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
    }

    fn zoom_range(&self) -> Result<Option<(u32, u32)>, ArchiveError> {
        let (min, max) = self.with_conn(|conn| {
            conn.query_row(
                "SELECT MIN(zoom_level), MAX(zoom_level) FROM tiles",
                [],
                |row| Ok((row.get::<_, Option<u32>>(0)?, row.get::<_, Option<u32>>(1)?)),
            )
        })?;

        if let (Some(min), Some(max)) = (min, max) {
            return Ok(Some((min, max)));
        }

        // Empty tile table: fall back to the declared range
        match (
            self.metadata_zoom(META_MIN_ZOOM)?,
            self.metadata_zoom(META_MAX_ZOOM)?,
        ) {
            (Some(min), Some(max)) => Ok(Some((min, max))),
            _ => Ok(None),
        }
    }

    fn close(&self) -> Result<(), ArchiveError> {
        let conn = self.conn.lock().take();
        match conn {
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| ArchiveError::Close(e.to_string())),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

/// Opens [`MbtilesArchive`]s from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct MbtilesOpener;

impl MbtilesOpener {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveOpener for MbtilesOpener {
    type Archive = MbtilesArchive;

    fn open(&self, path: &Path) -> Result<MbtilesArchive, ArchiveError> {
        MbtilesArchive::open(path)
    }
}

/// Whether `file_name` carries the MBTiles suffix.
pub fn is_archive_file(file_name: &str) -> bool {
    file_name.ends_with(ARCHIVE_SUFFIX)
}

// =============================================================================
// Tests
// =============================================================================
