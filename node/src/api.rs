//! # Read API
//!
//! Builds the axum router that serves the block cache over HTTP. Every
//! handler reads the published snapshot through a [`CacheReader`]; none of
//! them ever reaches the upstream node.
//!
//! ## Endpoints
//!
//! | Method | Path       | Description                                   |
//! |--------|------------|-----------------------------------------------|
//! | GET    | `/blocks`  | Cached blocks, oldest first (`[]` until ready) |
//! | GET    | `/health`  | Liveness probe                                |
//! | GET    | `/ready`   | 200 once a snapshot exists, 503 before        |
//! | GET    | `/status`  | Cache summary                                 |

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use blockwindow_core::{CacheReader, CacheUnavailable, SnapshotOrigin};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone. The reader is a handle onto the synchronizer's store.
#[derive(Clone)]
pub struct AppState {
    /// The service's reported version string.
    pub version: String,
    /// Configured window size, reported by `/status`.
    pub cache_size: usize,
    /// Read handle onto the published snapshot.
    pub reader: CacheReader,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured API port.
pub fn create_router(state: AppState) -> Router {
    // The block explorer front end fetches from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/blocks", get(blocks_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Service version.
    pub version: String,
    /// Whether a snapshot has been published.
    pub ready: bool,
    /// Configured window size.
    pub cache_size: usize,
    /// Number of blocks in the current snapshot.
    pub cached_blocks: usize,
    /// Hash of the newest cached block.
    pub tip_hash: Option<String>,
    /// Height of the newest cached block, if the node reports it.
    pub tip_height: Option<u64>,
    /// Whether the window reaches back to the genesis block.
    pub reaches_genesis: bool,
    /// Snapshot generation, starting at 1.
    pub generation: Option<u64>,
    /// `"rebuilt"` or `"extended"`.
    pub origin: Option<String>,
    /// ISO-8601 publication time of the current snapshot.
    pub published_at: Option<String>,
    /// Seconds since the current snapshot was published.
    pub age_secs: Option<i64>,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /ready`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /blocks` — the cached window, oldest block first.
///
/// Before the first successful sync the cache is empty and this returns an
/// empty array with 200, which is what block explorer front ends expect.
/// `/ready` is the place to ask whether the cache is populated.
async fn blocks_handler(State(state): State<AppState>) -> Response {
    let snapshot = match state.reader.read_current() {
        Ok(snapshot) => snapshot,
        Err(CacheUnavailable) => return Json(Vec::<()>::new()).into_response(),
    };

    match serde_json::to_vec(&snapshot.oldest_first()) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize block window");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "failed to serialize blocks".into(),
                }),
            )
                .into_response()
        }
    }
}

/// `GET /health` — returns 200 if the process is alive.
///
/// This is the liveness probe for orchestrators (k8s, systemd, etc.).
/// It intentionally does not look at the cache; that belongs in `/ready`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /ready` — 200 once a snapshot has been published, 503 before.
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.reader.read_current() {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                reason: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                reason: Some(e.to_string()),
            }),
        ),
    }
}

/// `GET /status` — cache summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let mut resp = StatusResponse {
        version: state.version.clone(),
        ready: false,
        cache_size: state.cache_size,
        cached_blocks: 0,
        tip_hash: None,
        tip_height: None,
        reaches_genesis: false,
        generation: None,
        origin: None,
        published_at: None,
        age_secs: None,
        timestamp: now.to_rfc3339(),
    };

    if let Ok(snapshot) = state.reader.read_current() {
        let window = snapshot.window();
        resp.ready = true;
        resp.cached_blocks = snapshot.len();
        resp.tip_hash = Some(snapshot.tip_hash().to_string());
        resp.tip_height = window.tip().height();
        resp.reaches_genesis = window.reaches_genesis();
        resp.generation = Some(snapshot.generation());
        resp.origin = Some(
            match snapshot.origin() {
                SnapshotOrigin::Rebuilt => "rebuilt",
                SnapshotOrigin::Extended { .. } => "extended",
            }
            .to_string(),
        );
        resp.published_at = Some(snapshot.published_at().to_rfc3339());
        resp.age_secs = Some((now - snapshot.published_at()).num_seconds());
    }

    Json(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use blockwindow_core::{
        Block, BlockHash, CacheStore, CacheSynchronizer, ChainWindow, InMemoryNode, SyncConfig,
    };
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn hash(n: u8) -> BlockHash {
        BlockHash::parse(format!("{:02x}", n).repeat(32)).unwrap()
    }

    fn block(n: u8) -> Block {
        let prev = if n == 0 { None } else { Some(hash(n - 1)) };
        Block::new(hash(n), prev)
            .with_field("height", serde_json::json!(n))
            .with_field("tx", serde_json::json!([format!("tx{}", n)]))
    }

    fn test_app_state(store: &CacheStore) -> AppState {
        AppState {
            version: "0.1.0-test".into(),
            cache_size: 3,
            reader: store.reader(),
        }
    }

    /// Store holding blocks `from..=to`.
    fn populated_store(from: u8, to: u8) -> CacheStore {
        let mut store = CacheStore::new();
        let blocks = (from..=to).rev().map(block).collect();
        store.replace(
            ChainWindow::from_newest_first(blocks).unwrap(),
            SnapshotOrigin::Rebuilt,
        );
        store
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    // -- /health ---------------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let store = CacheStore::new();
        let router = create_router(test_app_state(&store));
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    // -- /blocks ---------------------------------------------------------------

    #[tokio::test]
    async fn blocks_before_first_sync_is_an_empty_array() {
        let store = CacheStore::new();
        let router = create_router(test_app_state(&store));
        let (status, body) = get(&router, "/blocks").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!([]));
    }

    #[tokio::test]
    async fn blocks_are_served_oldest_first_with_all_fields() {
        let store = populated_store(4, 6);
        let router = create_router(test_app_state(&store));
        let (status, body) = get(&router, "/blocks").await;

        assert_eq!(status, StatusCode::OK);
        let blocks: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        let heights: Vec<_> = blocks
            .iter()
            .map(|b| b["height"].as_u64().unwrap())
            .collect();
        assert_eq!(heights, vec![4, 5, 6]);
        assert_eq!(blocks[2]["hash"], hash(6).to_string());
        assert_eq!(blocks[2]["previousblockhash"], hash(5).to_string());
        assert_eq!(blocks[2]["tx"], serde_json::json!(["tx6"]));
    }

    #[tokio::test]
    async fn genesis_block_is_served_without_a_parent_field() {
        let store = populated_store(0, 1);
        let router = create_router(test_app_state(&store));
        let (_, body) = get(&router, "/blocks").await;

        let blocks: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert!(blocks[0].get("previousblockhash").is_none());
    }

    #[tokio::test]
    async fn cross_origin_requests_are_allowed() {
        let store = populated_store(1, 2);
        let router = create_router(test_app_state(&store));
        let req = Request::builder()
            .uri("/blocks")
            .header("origin", "http://explorer.local")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();

        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    // -- /ready ----------------------------------------------------------------

    #[tokio::test]
    async fn ready_flips_after_first_publication() {
        let mut store = CacheStore::new();
        let router = create_router(test_app_state(&store));

        let (status, body) = get(&router, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let resp: ReadyResponse = serde_json::from_slice(&body).unwrap();
        assert!(!resp.ready);
        assert!(resp.reason.unwrap().contains("not populated"));

        store.replace(
            ChainWindow::from_newest_first(vec![block(0)]).unwrap(),
            SnapshotOrigin::Rebuilt,
        );
        let (status, _) = get(&router, "/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    // -- /status ---------------------------------------------------------------

    #[tokio::test]
    async fn status_reports_not_ready_on_empty_cache() {
        let store = CacheStore::new();
        let router = create_router(test_app_state(&store));
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert!(!resp.ready);
        assert_eq!(resp.cached_blocks, 0);
        assert!(resp.tip_hash.is_none());
        assert_eq!(resp.version, "0.1.0-test");
    }

    #[tokio::test]
    async fn status_summarizes_the_synchronized_window() {
        let node = Arc::new(InMemoryNode::with_chain((0..=9).map(block), hash(9)));
        let mut sync = CacheSynchronizer::new(
            Arc::clone(&node),
            SyncConfig {
                cache_size: 3,
                ..SyncConfig::default()
            },
        )
        .unwrap();
        let state = AppState {
            version: "0.1.0-test".into(),
            cache_size: 3,
            reader: sync.reader(),
        };
        sync.poll_once().await.unwrap();
        node.push(block(10));
        sync.poll_once().await.unwrap();

        let router = create_router(state);
        let (_, body) = get(&router, "/status").await;
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();

        assert!(resp.ready);
        assert_eq!(resp.cached_blocks, 3);
        assert_eq!(resp.cache_size, 3);
        assert_eq!(resp.tip_hash, Some(hash(10).to_string()));
        assert_eq!(resp.tip_height, Some(10));
        assert_eq!(resp.generation, Some(2));
        assert_eq!(resp.origin.as_deref(), Some("extended"));
        assert!(!resp.reaches_genesis);
        assert!(resp.age_secs.unwrap() >= 0);
    }
}
