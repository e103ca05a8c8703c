//! Read-only status server.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::model::{ConnectorMode, PublishRecord};
use crate::scheduler::{PostingScheduler, PostingStatus};
use crate::stats::{StatsSnapshot, StatsTracker};

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<PostingScheduler>,
    pub stats: Arc<StatsTracker>,
    pub mode: ConnectorMode,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(scheduler: Arc<PostingScheduler>, mode: ConnectorMode) -> Self {
        Self {
            stats: scheduler.stats(),
            scheduler,
            mode,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    let metrics = state.metrics.clone();
    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stats", get(stats))
        .route("/status", get(status))
        .route("/history", get(history))
        .route("/mode", get(mode))
        .with_state(state);
    match metrics {
        Some(h) => router.merge(crate::metrics::render_router(h)),
        None => router,
    }
}

async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

async fn status(State(state): State<AppState>) -> Json<PostingStatus> {
    Json(state.scheduler.status().await)
}

async fn history(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Vec<PublishRecord>> {
    let limit = q
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    Json(state.scheduler.recent_records(limit).await)
}

#[derive(Serialize)]
struct ModeResp {
    mode: ConnectorMode,
    dry_run: bool,
}

async fn mode(State(state): State<AppState>) -> Json<ModeResp> {
    Json(ModeResp {
        mode: state.mode,
        dry_run: state.scheduler.is_dry_run(),
    })
}
