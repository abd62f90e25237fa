//! API integration tests for tile retrieval, metadata and listing.

use axum::http::StatusCode;

use super::test_utils::{encode, get, region_archive, town_archive, MbtilesBuilder, TestServer};

/// Server with `town` and `region` loaded by the startup scan.
fn loaded_server() -> (TestServer, String, String) {
    let server = TestServer::new();
    server.add_file("town.mbtiles", &town_archive());
    server.add_file("region.mbtiles", &region_archive());
    assert_eq!(server.scan(), 2);

    let ids = server.store.list();
    let town = ids.iter().find(|id| id.starts_with("town!")).unwrap().clone();
    let region = ids.iter().find(|id| id.starts_with("region!")).unwrap().clone();
    (server, town, region)
}

// =============================================================================
// Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_named_tile_in_path() {
    let (server, town, _) = loaded_server();
    let router = server.router();

    let response = get(&router, &format!("/api/v1/mbtiles/{}/5/17/10", encode(&town))).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), b"town-5-17-10");
    assert_eq!(response.header("content-type"), Some("image/png"));
    assert_eq!(response.header("cache-control"), Some("public, max-age=600"));
    assert_eq!(response.header("x-dataset-id"), Some(town.as_str()));
}

#[tokio::test]
async fn test_named_tile_in_query() {
    let (server, _, region) = loaded_server();
    let router = server.router();

    let response = get(&router, &format!("/api/v1/mbtiles/2/1/1?mapName={}", encode(&region))).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), b"region-2-1-1");
    assert_eq!(response.header("content-type"), Some("image/webp"));
}

#[tokio::test]
async fn test_fallback_returns_first_dataset_in_order() {
    let (server, _, region) = loaded_server();
    let router = server.router();

    // Both datasets hold 2/1/1; "region!..." sorts before "town!..."
    let response = get(&router, "/api/v1/mbtiles/2/1/1").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), b"region-2-1-1");
    assert_eq!(response.header("x-dataset-id"), Some(region.as_str()));

    // Only the town has 5/17/10
    let response = get(&router, "/api/v1/mbtiles/5/17/10").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), b"town-5-17-10");
}

#[tokio::test]
async fn test_fallback_tile_not_found() {
    let (server, _, _) = loaded_server();
    let router = server.router();

    let response = get(&router, "/api/v1/mbtiles/9/9/9").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let json = response.json();
    assert_eq!(json["error"], "tile_not_found");
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_named_tile_missing() {
    let (server, town, _) = loaded_server();
    let router = server.router();

    let response = get(&router, &format!("/api/v1/mbtiles/{}/3/4/2", encode(&town))).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let json = response.json();
    assert_eq!(json["error"], "tile_not_found");
    assert!(json["message"].as_str().unwrap().contains(&town));
}

#[tokio::test]
async fn test_unknown_dataset_tile() {
    let (server, _, _) = loaded_server();
    let router = server.router();

    let response = get(&router, "/api/v1/mbtiles/nowhere%23123/2/1/1").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "dataset_not_found");

    let response = get(&router, "/api/v1/mbtiles/2/1/1?mapName=nowhere").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "dataset_not_found");
}

#[tokio::test]
async fn test_negative_coordinates_checked_first() {
    let (server, _, _) = loaded_server();
    let router = server.router();

    for uri in [
        "/api/v1/mbtiles/-1/0/0",
        "/api/v1/mbtiles/0/0/-1?mapName=nowhere",
        "/api/v1/mbtiles/nowhere/2/-1/1",
    ] {
        let response = get(&router, uri).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(response.json()["error"], "invalid_coordinate", "{}", uri);
    }
}

#[tokio::test]
async fn test_non_numeric_coordinates_rejected() {
    let (server, _, _) = loaded_server();
    let router = server.router();

    let response = get(&router, "/api/v1/mbtiles/a/b/c").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_archive_without_format_serves_octet_stream() {
    let server = TestServer::new();
    server.add_file("raw.mbtiles", &MbtilesBuilder::new().tile(0, 0, 0, b"raw"));
    server.scan();
    let router = server.router();

    let response = get(&router, "/api/v1/mbtiles/0/0/0").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("application/octet-stream"));
}

// =============================================================================
// Metadata
// =============================================================================

#[tokio::test]
async fn test_metadata() {
    let (server, town, _) = loaded_server();
    let router = server.router();

    let response = get(&router, &format!("/api/v1/mbtiles/{}", encode(&town))).await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_eq!(json["name"], "Town");
    assert_eq!(json["tileSetName"], "Town");
    assert_eq!(json["attribution"], "© Town Surveyors");
    assert_eq!(json["tileMimeType"], "image/png");
    assert_eq!(json["minZoom"], 2);
    assert_eq!(json["maxZoom"], 5);
    assert_eq!(json["minLon"], 13.1);
    assert_eq!(json["minLat"], 52.3);
    assert_eq!(json["maxLon"], 13.7);
    assert_eq!(json["maxLat"], 52.7);
    assert!(json["version"].is_null());
}

#[tokio::test]
async fn test_metadata_defaults() {
    let server = TestServer::new();
    server.add_file("bare.mbtiles", &MbtilesBuilder::new());
    server.scan();
    let id = server.store.list().remove(0);
    let router = server.router();

    let json = get(&router, &format!("/api/v1/mbtiles/{}", encode(&id)))
        .await
        .json();

    assert_eq!(json["name"], "unnamed dataset");
    assert_eq!(json["attribution"], "no attribution");
    assert_eq!(json["tileSetName"], "unnamed tileset");
    assert_eq!(json["tileMimeType"], "");
    assert_eq!(json["minZoom"], -1);
    assert_eq!(json["maxZoom"], -1);
    assert_eq!(json["minLon"], 0.0);
    assert_eq!(json["maxLat"], 0.0);
}

#[tokio::test]
async fn test_metadata_unknown_dataset() {
    let (server, _, _) = loaded_server();
    let router = server.router();

    let response = get(&router, "/api/v1/mbtiles/nowhere").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let json = response.json();
    assert_eq!(json["error"], "dataset_not_found");
    assert_eq!(json["status"], 404);
}

// =============================================================================
// Listing and Health
// =============================================================================

#[tokio::test]
async fn test_list_datasets_sorted() {
    let (server, town, region) = loaded_server();
    let router = server.router();

    let response = get(&router, "/api/v1/mbtiles").await;

    assert_eq!(response.status, StatusCode::OK);
    let ids: Vec<String> = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(ids, vec![region, town]);
}

#[tokio::test]
async fn test_list_empty() {
    let server = TestServer::new();
    let router = server.router();

    let response = get(&router, "/api/v1/mbtiles").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_ref(), b"[]");
}

#[tokio::test]
async fn test_health() {
    let (server, _, _) = loaded_server();
    let router = server.router();

    let response = get(&router, "/health").await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["datasets"], 2);
    assert!(json["version"].is_string());
}
