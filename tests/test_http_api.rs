//! HTTP query API driven in-process against a temporary SQLite database

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use templog::api::{create_router, ApiState};
use templog::storage::{SqliteStore, StreamKind};
use tower::ServiceExt;

fn setup() -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("temp.db");

    let writer = SqliteStore::open(&db).unwrap();
    writer.init_schema().unwrap();
    for (ts, v) in [(100, 20.0), (200, 22.0), (300, 24.0)] {
        writer.insert(StreamKind::Raw, ts, v).unwrap();
    }
    writer.insert(StreamKind::Hourly, 0, 21.5).unwrap();

    let reader = SqliteStore::open(&db).unwrap();
    (dir, create_router(ApiState::new(reader)))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (_dir, app) = setup();
    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_current_reading() {
    let (_dir, app) = setup();
    let (status, body) = get(app, "/api/current").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["ts"], 300);
    assert_eq!(body["value"], 24.0);
}

#[tokio::test]
async fn test_current_on_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("empty.db")).unwrap();
    store.init_schema().unwrap();
    let app = create_router(ApiState::new(store));

    let (status, body) = get(app, "/api/current").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_stats() {
    let (_dir, app) = setup();
    let (status, body) = get(app.clone(), "/api/stats?kind=raw&from=100&to=200").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["count"], 2);
    assert_eq!(body["min"], 20.0);
    assert_eq!(body["max"], 22.0);
    assert_eq!(body["avg"], 21.0);

    let (_, empty) = get(app, "/api/stats?kind=daily&from=0&to=1000").await;
    assert_eq!(empty["count"], 0);
}

#[tokio::test]
async fn test_series() {
    let (_dir, app) = setup();
    let (status, body) = get(app.clone(), "/api/series?kind=raw&from=0&to=1000&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0]["ts"], 100);
    assert_eq!(points[1]["value"], 22.0);

    let (_, hourly) = get(app, "/api/series?kind=hourly&from=0&to=0").await;
    assert_eq!(hourly["points"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_params() {
    let (_dir, app) = setup();
    for uri in ["/api/stats?kind=raw&from=0", "/api/series?from=0&to=10", "/api/stats"] {
        let (status, body) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["ok"], false);
        assert_eq!(body["err"], "missing params");
    }
}

#[tokio::test]
async fn test_bad_request() {
    let (_dir, app) = setup();
    for uri in [
        "/api/stats?kind=weekly&from=0&to=10",
        "/api/stats?kind=raw&from=yesterday&to=10",
        "/api/series?kind=raw&from=0&to=10&limit=many",
    ] {
        let (status, body) = get(app.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["err"], "bad request");
    }
}

#[tokio::test]
async fn test_failed_query_is_reported_not_propagated() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("temp.db")).unwrap();
    store.init_schema().unwrap();
    let state = ApiState::new(store);

    // Poison the reader lock
    let shared = state.store.clone();
    let _ = std::thread::spawn(move || {
        let _guard = shared.lock().unwrap();
        panic!("reader thread died");
    })
    .join();

    let app = create_router(state);
    let (status, body) = get(app.clone(), "/api/stats?kind=raw&from=0&to=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["err"], "bad request");

    let (status, body) = get(app, "/api/current").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
}
