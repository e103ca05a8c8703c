//! Prometheus exporter and metric descriptions.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::error::{Result, ScoutError};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once, from the binary.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| ScoutError::config(format!("prometheus recorder: {e}")))?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        render_router(self.handle.clone())
    }
}

pub(crate) fn render_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let h = handle.clone();
            async move { h.render() }
        }),
    )
}

/// One-time registration so series show up on /metrics before first use.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scout_fetch_total", "Source-group fetches attempted.");
        describe_counter!(
            "scout_fetch_errors_total",
            "Source-group fetches that failed or timed out."
        );
        describe_counter!(
            "scout_quality_rejected_total",
            "Fetched threads rejected by the quality gate, by reason."
        );
        describe_counter!(
            "scout_publish_outcomes_total",
            "Publish attempts by outcome."
        );
        describe_counter!(
            "scout_replies_rejected_total",
            "Composed replies rejected before scheduling."
        );
        describe_histogram!("scout_fetch_ms", "Fetch latency in milliseconds.");
        describe_histogram!("scout_publish_ms", "Publish call latency in milliseconds.");
        describe_histogram!("scout_compose_ms", "Reply composition latency in milliseconds.");
        describe_gauge!("scout_cycle_last_run_ts", "Unix ts of the last finished cycle.");
    });
}
