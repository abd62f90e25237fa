//! Test utilities: MBTiles fixtures, multipart bodies and router helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use mbtiles_streamer::{create_router, DatasetStore, MbtilesOpener, RouterConfig};

// =============================================================================
// MBTiles Fixtures
// =============================================================================

/// Builds a real MBTiles (SQLite) file.
#[derive(Default)]
pub struct MbtilesBuilder {
    metadata: Vec<(String, String)>,
    tiles: Vec<(u32, u32, u32, Vec<u8>)>,
}

impl MbtilesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(mut self, name: &str, value: &str) -> Self {
        self.metadata.push((name.to_string(), value.to_string()));
        self
    }

    pub fn tile(mut self, z: u32, x: u32, y: u32, data: &[u8]) -> Self {
        self.tiles.push((z, x, y, data.to_vec()));
        self
    }

    /// Write the archive to `dir/file_name` and return its path.
    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE metadata (name TEXT, value TEXT);
             CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
             CREATE UNIQUE INDEX tile_index ON tiles (zoom_level, tile_column, tile_row);",
        )
        .unwrap();

        for (name, value) in &self.metadata {
            conn.execute(
                "INSERT INTO metadata (name, value) VALUES (?1, ?2)",
                rusqlite::params![name, value],
            )
            .unwrap();
        }
        for (z, x, y, data) in &self.tiles {
            conn.execute(
                "INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![z, x, y, data],
            )
            .unwrap();
        }

        conn.close().unwrap();
        path
    }

    /// The archive as raw bytes, for uploads.
    pub fn to_bytes(&self) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = self.write_to(dir.path(), "fixture.mbtiles");
        std::fs::read(path).unwrap()
    }
}

/// A small PNG tileset covering a town.
pub fn town_archive() -> MbtilesBuilder {
    MbtilesBuilder::new()
        .metadata("name", "Town")
        .metadata("format", "png")
        .metadata("bounds", "13.1,52.3,13.7,52.7")
        .metadata("attribution", "© Town Surveyors")
        .tile(2, 1, 1, b"town-2-1-1")
        .tile(5, 17, 10, b"town-5-17-10")
}

/// A WebP tileset that overlaps the town at zoom 2.
pub fn region_archive() -> MbtilesBuilder {
    MbtilesBuilder::new()
        .metadata("name", "Region")
        .metadata("format", "webp")
        .tile(2, 1, 1, b"region-2-1-1")
        .tile(3, 4, 2, b"region-3-4-2")
}

// =============================================================================
// Multipart Bodies
// =============================================================================

pub const BOUNDARY: &str = "mbtiles-test-boundary";

/// Builds `multipart/form-data` request bodies.
#[derive(Default)]
pub struct MultipartBuilder {
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}

/// POST request to the upload endpoint.
pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/mbtiles/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Upload request carrying `mapName` and `file`.
pub fn upload_archive(map_name: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    upload_request(
        MultipartBuilder::new()
            .text("mapName", map_name)
            .file("file", file_name, data)
            .build(),
    )
}

// =============================================================================
// Server Fixture
// =============================================================================

/// A store over a temporary archive directory, plus router construction.
pub struct TestServer {
    pub dir: TempDir,
    pub store: Arc<DatasetStore<MbtilesOpener>>,
    pub max_file_size_mib: u64,
}

impl TestServer {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            store: Arc::new(DatasetStore::new(MbtilesOpener::new())),
            max_file_size_mib: 10,
        }
    }

    pub fn with_max_file_size_mib(mut self, mib: u64) -> Self {
        self.max_file_size_mib = mib;
        self
    }

    /// Directory scanned at startup and used for uploads.
    pub fn upload_dir(&self) -> PathBuf {
        self.dir.path().join("mbtiles")
    }

    /// Place an archive in the upload directory.
    pub fn add_file(&self, file_name: &str, archive: &MbtilesBuilder) -> PathBuf {
        std::fs::create_dir_all(self.upload_dir()).unwrap();
        archive.write_to(&self.upload_dir(), file_name)
    }

    /// Run the startup scan.
    pub fn scan(&self) -> usize {
        self.store.scan(&self.upload_dir())
    }

    pub fn router(&self) -> Router {
        let config = RouterConfig::new(self.upload_dir())
            .with_max_file_size_mib(self.max_file_size_mib)
            .with_cache_max_age(600)
            .with_tracing(false);
        create_router(Arc::clone(&self.store), config)
    }

    /// Files currently in the upload directory.
    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.upload_dir())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

// =============================================================================
// Request Helpers
// =============================================================================

/// A collected response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    send(
        router,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn delete(router: &Router, uri: &str) -> TestResponse {
    send(
        router,
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

/// Percent-encode a dataset identifier for use in a path or query.
pub fn encode(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}
