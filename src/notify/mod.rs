//! Operator notifications: a short summary after each cycle.
//!
//! Channels are enabled by env (`DISCORD_WEBHOOK_URL`, `SLACK_WEBHOOK_URL`).
//! Failures are logged and never stop the service.

pub mod discord;
pub mod slack;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{ConnectorMode, PublishOutcome};
use crate::pipeline::CycleReport;

pub use discord::DiscordNotifier;
pub use slack::SlackNotifier;

/// Failed entries beyond this are counted but not listed.
const MAX_LISTED_FAILURES: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct CycleSummary {
    pub finished_at: DateTime<Utc>,
    pub mode: ConnectorMode,
    pub dry_run: bool,
    pub fetched: usize,
    pub outcomes: BTreeMap<&'static str, usize>,
    pub not_attempted: usize,
    /// `(thread id, reason)` of failed publishes, then failed groups.
    pub failures: Vec<(String, String)>,
}

impl CycleSummary {
    pub fn from_report(report: &CycleReport) -> Self {
        let mut failures: Vec<(String, String)> = report
            .batch
            .failed()
            .map(|r| (r.thread_id.clone(), r.detail.clone().unwrap_or_default()))
            .collect();
        failures.extend(
            report
                .failed_groups
                .iter()
                .map(|g| (format!("r/{}", g.group), g.reason.clone())),
        );
        Self {
            finished_at: report.finished_at,
            mode: report.mode,
            dry_run: report.dry_run,
            fetched: report.fetched,
            outcomes: report.batch.counts(),
            not_attempted: report.batch.not_attempted.len(),
            failures,
        }
    }

    pub fn title(&self) -> String {
        let posted = self.outcomes.get(PublishOutcome::Posted.as_str()).copied().unwrap_or(0);
        let tag = if self.dry_run { " (dry-run)" } else { "" };
        format!("Scout cycle: {posted} posted{tag}")
    }

    /// Plain multi-line body shared by every channel.
    pub fn body(&self) -> String {
        let mut lines = vec![format!(
            "mode: {} | fetched: {} | not attempted: {}",
            self.mode, self.fetched, self.not_attempted
        )];
        if !self.outcomes.is_empty() {
            let parts: Vec<String> = self.outcomes.iter().map(|(k, v)| format!("{k}={v}")).collect();
            lines.push(format!("outcomes: {}", parts.join(", ")));
        }
        for (id, reason) in self.failures.iter().take(MAX_LISTED_FAILURES) {
            lines.push(format!("failed {id}: {reason}"));
        }
        if self.failures.len() > MAX_LISTED_FAILURES {
            lines.push(format!("... and {} more", self.failures.len() - MAX_LISTED_FAILURES));
        }
        lines.push(format!("at {}", self.finished_at.to_rfc3339()));
        lines.join("\n")
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, summary: &CycleSummary) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Fans a summary out to every configured channel.
#[derive(Default)]
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let mut mux = Self::new();
        if let Some(url) = env_url("DISCORD_WEBHOOK_URL") {
            mux = mux.with(DiscordNotifier::new(url));
        }
        if let Some(url) = env_url("SLACK_WEBHOOK_URL") {
            mux = mux.with(SlackNotifier::new(url));
        }
        tracing::info!(channels = mux.len(), "notifiers configured");
        mux
    }

    pub fn with<N: Notifier + 'static>(mut self, n: N) -> Self {
        self.channels.push(Box::new(n));
        self
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Send to all channels; returns how many succeeded.
    pub async fn notify(&self, summary: &CycleSummary) -> usize {
        let mut ok = 0;
        for ch in &self.channels {
            match ch.send(summary).await {
                Ok(()) => ok += 1,
                Err(e) => tracing::warn!(channel = ch.name(), error = %e, "notification failed"),
            }
        }
        ok
    }
}

fn env_url(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(Arc<AtomicUsize>, bool);

    #[async_trait]
    impl Notifier for Counting {
        async fn send(&self, _s: &CycleSummary) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if self.1 {
                anyhow::bail!("channel down");
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn summary() -> CycleSummary {
        CycleSummary {
            finished_at: Utc::now(),
            mode: ConnectorMode::Fallback,
            dry_run: true,
            fetched: 7,
            outcomes: BTreeMap::from([("posted", 2), ("skipped-duplicate", 1)]),
            not_attempted: 0,
            failures: (0..7).map(|i| (format!("t{i}"), "timeout".into())).collect(),
        }
    }

    #[tokio::test]
    async fn failing_channel_does_not_stop_others() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mux = NotifierMux::new()
            .with(Counting(hits.clone(), true))
            .with(Counting(hits.clone(), false));
        assert_eq!(mux.notify(&summary()).await, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn body_lists_a_bounded_number_of_failures() {
        let s = summary();
        assert_eq!(s.title(), "Scout cycle: 2 posted (dry-run)");
        let body = s.body();
        assert!(body.contains("posted=2"));
        assert!(body.contains("failed t4: timeout"));
        assert!(!body.contains("failed t5"));
        assert!(body.contains("... and 2 more"));
    }
}
