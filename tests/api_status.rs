// tests/api_status.rs
//
// Status router exercised via tower::ServiceExt::oneshot, no sockets.

mod common;

use std::sync::Arc;

use axum::{
    body::{self, Body},
    Router,
};
use http::{Request, StatusCode};
use serde_json::Value as Json;
use tower::ServiceExt as _;

use common::{posting, submission, t0, RecordingConnector};
use thread_scout::clock::ManualClock;
use thread_scout::history::HistoryStore;
use thread_scout::{create_router, AppState, ConnectorMode, PostingScheduler};

const BODY_LIMIT: usize = 1024 * 1024;

async fn app_with_history() -> Router {
    let clock = Arc::new(ManualClock::new(t0()));
    let s = Arc::new(PostingScheduler::new(
        &posting(false),
        HistoryStore::in_memory(),
        Arc::new(RecordingConnector::new()),
        clock,
    ));
    s.post_one(submission("a", 0)).await;
    s.post_one(submission("b", 1)).await;
    create_router(AppState::new(s, ConnectorMode::Live))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = get(app_with_history().await, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ok");
}

#[tokio::test]
async fn mode_reports_connector_and_dry_run() {
    let (status, body) = get(app_with_history().await, "/mode").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["mode"], "live");
    assert_eq!(v["dry_run"], false);
}

#[tokio::test]
async fn history_honours_limit() {
    let (status, body) = get(app_with_history().await, "/history?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    let arr = v.as_array().expect("array");
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["thread_id"], "b");
    assert_eq!(arr[0]["outcome"], "skipped-rate-limit");
}

#[tokio::test]
async fn stats_and_status_are_json() {
    let app = app_with_history().await;
    let (status, body) = get(app.clone(), "/stats").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["outcomes"]["posted"], 1);

    let (status, body) = get(app, "/status").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["posted_today"], 1);
    assert_eq!(v["can_publish_now"], false);
}
