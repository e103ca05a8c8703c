//! Aggregated counters and latencies for observability.
//!
//! Derived state only: nothing reads these numbers back to make a decision.
//! Every `record_*` call also feeds the `metrics` facade.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;

use crate::analyze::RankStats;
use crate::model::PublishOutcome;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct Latency {
    pub count: u64,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl Latency {
    fn record(&mut self, d: Duration) {
        let ms = d.as_secs_f64() * 1_000.0;
        self.count += 1;
        self.total_ms += ms;
        if ms > self.max_ms {
            self.max_ms = ms;
        }
    }

    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub fetches: u64,
    pub fetch_errors: u64,
    pub threads_fetched: u64,
    pub quality_rejected: BTreeMap<String, u64>,
    pub below_threshold: u64,
    pub duplicates_collapsed: u64,
    pub compose_failed: u64,
    pub replies_rejected: u64,
    pub outcomes: BTreeMap<String, u64>,
    pub fetch_latency: Latency,
    pub compose_latency: Latency,
    pub publish_latency: Latency,
}

#[derive(Debug, Default)]
pub struct StatsTracker {
    inner: Mutex<StatsSnapshot>,
}

impl StatsTracker {
    pub fn new() -> Self {
        crate::metrics::ensure_described();
        Self::default()
    }

    fn with<F: FnOnce(&mut StatsSnapshot)>(&self, f: F) {
        let mut g = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut g);
    }

    pub fn record_fetch(&self, ok: bool, threads: usize, elapsed: Duration) {
        counter!("scout_fetch_total").increment(1);
        histogram!("scout_fetch_ms").record(elapsed.as_secs_f64() * 1_000.0);
        if !ok {
            counter!("scout_fetch_errors_total").increment(1);
        }
        self.with(|s| {
            s.fetches += 1;
            s.threads_fetched += threads as u64;
            s.fetch_latency.record(elapsed);
            if !ok {
                s.fetch_errors += 1;
            }
        });
    }

    pub fn record_quality_rejection(&self, label: &'static str) {
        counter!("scout_quality_rejected_total", "reason" => label).increment(1);
        self.with(|s| *s.quality_rejected.entry(label.to_string()).or_default() += 1);
    }

    pub fn record_rank(&self, r: &RankStats) {
        self.with(|s| {
            s.below_threshold += r.below_threshold as u64;
            s.duplicates_collapsed += r.duplicates_collapsed as u64;
        });
    }

    pub fn record_compose(&self, ok: bool, elapsed: Duration) {
        histogram!("scout_compose_ms").record(elapsed.as_secs_f64() * 1_000.0);
        self.with(|s| {
            s.compose_latency.record(elapsed);
            if !ok {
                s.compose_failed += 1;
            }
        });
    }

    pub fn record_reply_rejected(&self) {
        counter!("scout_replies_rejected_total").increment(1);
        self.with(|s| s.replies_rejected += 1);
    }

    /// `publish_elapsed` is set only when the platform was actually called.
    pub fn record_outcome(&self, outcome: PublishOutcome, publish_elapsed: Option<Duration>) {
        counter!("scout_publish_outcomes_total", "outcome" => outcome.as_str()).increment(1);
        if let Some(d) = publish_elapsed {
            histogram!("scout_publish_ms").record(d.as_secs_f64() * 1_000.0);
        }
        self.with(|s| {
            *s.outcomes.entry(outcome.as_str().to_string()).or_default() += 1;
            if let Some(d) = publish_elapsed {
                s.publish_latency.record(d);
            }
        });
    }

    pub fn record_cycle(&self, at: DateTime<Utc>) {
        gauge!("scout_cycle_last_run_ts").set(at.timestamp() as f64);
        self.with(|s| {
            s.cycles += 1;
            s.last_cycle_at = Some(at);
        });
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
