//! In-memory archives for unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::ArchiveError;

use super::reader::{ArchiveOpener, TileArchive};

/// Archive backed by hash maps, with observable close state.
pub struct MemoryArchive {
    path: PathBuf,
    tiles: HashMap<(u32, u32, u32), Bytes>,
    metadata: HashMap<String, String>,
    zoom_range: Option<(u32, u32)>,
    closed: Arc<AtomicBool>,
    fail_close: bool,
    fail_metadata: bool,
}

impl MemoryArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tiles: HashMap::new(),
            metadata: HashMap::new(),
            zoom_range: None,
            closed: Arc::new(AtomicBool::new(false)),
            fail_close: false,
            fail_metadata: false,
        }
    }

    pub fn with_tile(mut self, z: u32, x: u32, y: u32, data: &'static [u8]) -> Self {
        self.tiles.insert((z, x, y), Bytes::from_static(data));
        let (min, max) = self.zoom_range.unwrap_or((z, z));
        self.zoom_range = Some((min.min(z), max.max(z)));
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn failing_metadata(mut self) -> Self {
        self.fail_metadata = true;
        self
    }

    /// Shared flag that flips once the archive is closed.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    fn ensure_open(&self) -> Result<(), ArchiveError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ArchiveError::Closed)
        } else {
            Ok(())
        }
    }
}

impl TileArchive for MemoryArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read_tile(&self, z: u32, x: u32, y: u32) -> Result<Option<Bytes>, ArchiveError> {
        self.ensure_open()?;
        Ok(self.tiles.get(&(z, x, y)).cloned())
    }

    fn metadata_value(&self, key: &str) -> Result<Option<String>, ArchiveError> {
        self.ensure_open()?;
        if self.fail_metadata {
            return Err(ArchiveError::Read("no such table: metadata".to_string()));
        }
        Ok(self.metadata.get(key).cloned())
    }

    fn zoom_range(&self) -> Result<Option<(u32, u32)>, ArchiveError> {
        self.ensure_open()?;
        Ok(self.zoom_range)
    }

    fn close(&self) -> Result<(), ArchiveError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            Err(ArchiveError::Close("database is locked".to_string()))
        } else {
            Ok(())
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Opener serving pre-built [`MemoryArchive`]s keyed by file name.
#[derive(Default)]
pub struct MemoryOpener {
    archives: Mutex<HashMap<String, MemoryArchive>>,
    open_count: AtomicUsize,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_archive(self, file_name: &str, archive: MemoryArchive) -> Self {
        self.archives.lock().insert(file_name.to_string(), archive);
        self
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }
}

impl ArchiveOpener for MemoryOpener {
    type Archive = MemoryArchive;

    fn open(&self, path: &Path) -> Result<MemoryArchive, ArchiveError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.archives
            .lock()
            .remove(&file_name)
            .ok_or_else(|| ArchiveError::Open {
                path: path.display().to_string(),
                message: "file is not a database".to_string(),
            })
    }
}

/// Write a real MBTiles file at `path`.
pub fn write_mbtiles(path: &Path, metadata: &[(&str, &str)], tiles: &[(u32, u32, u32, &[u8])]) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE metadata (name TEXT, value TEXT);
         CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);",
    )
    .unwrap();
    for (name, value) in metadata {
        conn.execute(
            "INSERT INTO metadata (name, value) VALUES (?1, ?2)",
            rusqlite::params![name, value],
        )
        .unwrap();
    }
    for (z, x, y, data) in tiles {
        conn.execute(
            "INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![z, x, y, data],
        )
        .unwrap();
    }
    conn.close().unwrap();
}

/// Build a real MBTiles file in a scratch directory and return its bytes.
pub fn mbtiles_bytes(metadata: &[(&str, &str)], tiles: &[(u32, u32, u32, &[u8])]) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.mbtiles");
    write_mbtiles(&path, metadata, tiles);
    std::fs::read(&path).unwrap()
}
