// tests/pipeline_e2e.rs
//
// Whole cycles, offline: synthetic or recording connector, manual clock,
// template or scripted composer. Every fetched thread must land in exactly one
// bucket of the cycle report.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use common::{t0, thread, RecordingConnector};
use thread_scout::clock::{Clock, ManualClock};
use thread_scout::compose::{ResponseComposer, TemplateComposer};
use thread_scout::config::ReplyStyle;
use thread_scout::history::HistoryStore;
use thread_scout::source::{Connection, SourceConnector, SyntheticConnector};
use thread_scout::{
    BusinessContext, CancelSignal, ConnectorMode, Pipeline, PostingScheduler, PublishOutcome, ScoutConfig,
    ScoutError, Thread,
};

fn context(groups: &[&str]) -> BusinessContext {
    BusinessContext {
        product_summary: "TaskPilot".into(),
        key_benefits: vec!["keeps every task and deadline in one place".into()],
        recommended_groups: groups.iter().map(|g| g.to_string()).collect(),
        ..Default::default()
    }
}

fn pipeline(
    config: ScoutConfig,
    mode: ConnectorMode,
    connector: Arc<dyn SourceConnector>,
    composer: Arc<dyn ResponseComposer>,
) -> Pipeline {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(t0()));
    let scheduler = Arc::new(PostingScheduler::new(
        &config.posting,
        HistoryStore::in_memory(),
        Arc::clone(&connector),
        Arc::clone(&clock),
    ));
    Pipeline::new(config, Connection::new(mode, connector), scheduler, composer, clock)
}

#[tokio::test]
async fn synthetic_dry_run_cycle_is_balanced_and_publishes_nothing() {
    let synthetic = Arc::new(SyntheticConnector::new(t0()));
    let p = pipeline(
        ScoutConfig::default(),
        ConnectorMode::Fallback,
        synthetic.clone(),
        Arc::new(TemplateComposer),
    );

    let ctx = context(&["smallbusiness", "productivity", "entrepreneur", "startups"]);
    let report = p.run_cycle(&ctx, &CancelSignal::new()).await;

    assert!(report.is_balanced(), "unbalanced report: {report:#?}");
    assert_eq!(report.fetched, 7);
    assert!(report.failed_groups.is_empty());
    let rejected: Vec<&str> = report.quality_rejected.iter().map(|n| n.thread_id.as_str()).collect();
    assert!(rejected.contains(&"mock6"), "link post must be rejected");
    assert!(rejected.contains(&"mock7"), "low popularity must be rejected");
    assert_eq!(report.below_threshold, 1, "the rant scores zero");
    assert_eq!(report.batch.total(), 4);
    assert!(report.batch.count(PublishOutcome::Posted) >= 1);
    assert!(report.batch.records.iter().all(|r| r.simulated));
    assert_eq!(synthetic.published_count(), 0);
    assert!(report.dry_run);
    assert_eq!(report.mode, ConnectorMode::Fallback);

    let real = p.scheduler().state().await;
    assert_eq!(real.published_count(), 0);
}

#[tokio::test]
async fn ranked_replies_follow_score_order() {
    let synthetic = Arc::new(SyntheticConnector::new(t0()));
    let p = pipeline(
        ScoutConfig::default(),
        ConnectorMode::Fallback,
        synthetic,
        Arc::new(TemplateComposer),
    );
    let report = p
        .run_cycle(&context(&["smallbusiness", "productivity", "entrepreneur", "startups"]), &CancelSignal::new())
        .await;
    let posted: Vec<_> = report
        .batch
        .records
        .iter()
        .filter(|r| r.outcome == PublishOutcome::Posted)
        .map(|r| r.published_at)
        .collect();
    for w in posted.windows(2) {
        assert!(w[1] - w[0] >= Duration::seconds(600), "paced by the minimum interval");
    }
}

/// Fails for one thread, returns an advert for another.
struct ScriptedComposer;

#[async_trait]
impl ResponseComposer for ScriptedComposer {
    async fn compose(&self, thread: &Thread, _ctx: &BusinessContext, _style: ReplyStyle) -> thread_scout::Result<String> {
        match thread.id.as_str() {
            "boom" => Err(ScoutError::Compose("upstream 500".into())),
            "promo" => Ok("Click here to buy now, we have a discount for you!".into()),
            _ => Ok("A shared kanban board fixed most of our deadline chaos.".into()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn asks(ids: &[&str]) -> Vec<Thread> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            thread(
                id,
                "smallbusiness",
                "Looking for a simple CRM",
                "Any advice on a CRM for a three person shop?",
                20,
                t0() - Duration::hours(i as i64 + 1),
            )
        })
        .collect()
}

#[tokio::test]
async fn failures_are_reported_in_their_own_buckets() {
    let mut conn = RecordingConnector::with_threads(asks(&["ok", "boom", "promo"]));
    conn.fail_groups.insert("startups".into());
    let conn = Arc::new(conn);

    let mut cfg = ScoutConfig::default();
    cfg.posting.dry_run = false;
    let p = pipeline(cfg, ConnectorMode::Live, conn.clone(), Arc::new(ScriptedComposer));

    let report = p
        .run_cycle(&context(&["smallbusiness", "startups"]), &CancelSignal::new())
        .await;

    assert!(report.is_balanced(), "unbalanced report: {report:#?}");
    assert_eq!(report.fetched, 3);
    assert_eq!(report.failed_groups.len(), 1);
    assert_eq!(report.failed_groups[0].group, "startups");
    assert_eq!(report.failed_groups[0].reason, "HTTP 503");
    assert_eq!(report.compose_failed.len(), 1);
    assert_eq!(report.compose_failed[0].thread_id, "boom");
    assert_eq!(report.rejected_replies.len(), 1);
    assert_eq!(report.rejected_replies[0].thread_id, "promo");
    assert_eq!(report.batch.outcomes(), vec![PublishOutcome::Posted]);
    assert_eq!(conn.published_ids(), vec!["ok".to_string()]);

    let stats = p.scheduler().stats().snapshot();
    assert_eq!(stats.fetch_errors, 1);
    assert_eq!(stats.compose_failed, 1);
    assert_eq!(stats.replies_rejected, 1);
    assert_eq!(stats.cycles, 1);
}

#[tokio::test]
async fn candidates_past_the_cycle_limit_are_deferred() {
    let conn = Arc::new(RecordingConnector::with_threads(asks(&["a", "b", "c"])));
    let mut cfg = ScoutConfig::default();
    cfg.discovery.max_candidates = 1;
    let p = pipeline(cfg, ConnectorMode::Live, conn, Arc::new(TemplateComposer));

    let report = p.run_cycle(&context(&["smallbusiness"]), &CancelSignal::new()).await;
    assert!(report.is_balanced());
    assert_eq!(report.deferred.len(), 2);
    assert_eq!(report.batch.total(), 1);
    // Same score everywhere: the newest thread wins.
    assert_eq!(report.batch.records[0].thread_id, "a");
}

#[tokio::test]
async fn cancelled_cycle_fetches_nothing() {
    let conn = Arc::new(RecordingConnector::with_threads(asks(&["a"])));
    let p = pipeline(ScoutConfig::default(), ConnectorMode::Live, conn.clone(), Arc::new(TemplateComposer));

    let cancel = CancelSignal::new();
    cancel.cancel();
    let report = p.run_cycle(&context(&["smallbusiness", "startups"]), &cancel).await;

    assert!(report.is_balanced());
    assert_eq!(report.fetched, 0);
    assert_eq!(report.skipped_groups.len(), 2);
    assert_eq!(conn.publish_calls(), 0);
}
