//! HTTP query API over the SQLite store
//!
//! All handlers share one reader connection behind a mutex and run their
//! queries on the blocking pool; the ingestion thread writes through its own
//! connection.

use crate::storage::{DbPoint, SqliteStore, StoreError, StreamKind};
use crate::timeutil::Timestamp;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<Mutex<SqliteStore>>,
}

impl ApiState {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    /// Run one query against the reader connection off the async workers
    async fn query<T, F>(&self, run: F) -> Result<T, StoreError>
    where
        F: FnOnce(&SqliteStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let store = store
                .lock()
                .map_err(|_| StoreError::Database("store lock poisoned".to_string()))?;
            run(&store)
        })
        .await
        .map_err(|e| StoreError::Database(format!("query task failed: {}", e)))?
    }
}

/// Query string for `/api/stats` and `/api/series`. Numbers are kept as text
/// so a malformed value is a "bad request" rather than an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub kind: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<String>,
}

enum ApiError {
    MissingParams,
    BadRequest,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::MissingParams => "missing params",
            ApiError::BadRequest => "bad request",
        };
        (StatusCode::BAD_REQUEST, Json(json!({ "ok": false, "err": err }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        log::warn!("Query failed: {}", err);
        ApiError::BadRequest
    }
}

struct Range {
    kind: StreamKind,
    from: Timestamp,
    to: Timestamp,
}

impl RangeQuery {
    fn range(&self) -> Result<Range, ApiError> {
        let (kind, from, to) = match (&self.kind, &self.from, &self.to) {
            (Some(k), Some(f), Some(t)) if !k.is_empty() && !f.is_empty() && !t.is_empty() => (k, f, t),
            _ => return Err(ApiError::MissingParams),
        };
        Ok(Range {
            kind: SqliteStore::resolve_kind(kind)?,
            from: from.trim().parse().map_err(|_| ApiError::BadRequest)?,
            to: to.trim().parse().map_err(|_| ApiError::BadRequest)?,
        })
    }

    fn limit(&self) -> Result<i64, ApiError> {
        match self.limit.as_deref().map(str::trim) {
            None | Some("") => Ok(0),
            Some(raw) => raw.parse().map_err(|_| ApiError::BadRequest),
        }
    }
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/current", get(current))
        .route("/api/stats", get(stats))
        .route("/api/series", get(series))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn current(State(state): State<ApiState>) -> Response {
    let latest = state.query(|store| store.latest_raw()).await;
    match latest {
        Ok(Some(DbPoint { ts, value })) => Json(json!({ "ok": true, "ts": ts, "value": value })).into_response(),
        Ok(None) => Json(json!({ "ok": false })).into_response(),
        Err(e) => {
            log::warn!("Current reading unavailable: {}", e);
            Json(json!({ "ok": false })).into_response()
        }
    }
}

async fn stats(State(state): State<ApiState>, Query(query): Query<RangeQuery>) -> Result<Response, ApiError> {
    let range = query.range()?;
    let stats = state
        .query(move |store| store.stats(range.kind, range.from, range.to))
        .await?;
    Ok(Json(json!({
        "ok": true,
        "count": stats.count,
        "min": stats.min,
        "max": stats.max,
        "avg": stats.avg,
    }))
    .into_response())
}

async fn series(State(state): State<ApiState>, Query(query): Query<RangeQuery>) -> Result<Response, ApiError> {
    let range = query.range()?;
    let limit = query.limit()?;
    let points = state
        .query(move |store| store.series(range.kind, range.from, range.to, limit))
        .await?;
    Ok(Json(json!({ "ok": true, "points": points })).into_response())
}

/// Bind and serve until the listener fails
pub async fn start_server(addr: SocketAddr, state: ApiState) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("🌐 HTTP API listening on http://{}", addr);
    axum::serve(listener, app).await
}
