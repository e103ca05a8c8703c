//! Posting scheduler: the only writer of posting state.
//!
//! Per submission, in order:
//! 1. thread already replied to, or reply too close to a recent one → `skipped-duplicate`
//! 2. today's count at the cap → `skipped-daily-cap`
//! 3. inside the minimum interval since the last success → `skipped-rate-limit`
//! 4. dry-run → simulated `posted` in a separate ledger, no platform call
//! 5. publish → `posted` and commit, or `failed` without touching count or window
//!
//! Steps 1-5 for one submission run under a single lock inside a spawned task,
//! so no two decisions interleave and a publish that has started finishes and
//! commits even if the caller goes away.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::analyze::{AntiSpam, AntiSpamParams};
use crate::cancel::CancelSignal;
use crate::clock::Clock;
use crate::config::PostingConfig;
use crate::context::text_id;
use crate::history::{HistoryStore, PostingSummary};
use crate::model::{Candidate, PublishOutcome, PublishRecord, ThreadId};
use crate::source::SourceConnector;
use crate::stats::StatsTracker;

/// A ranked candidate together with the reply composed for it.
#[derive(Debug, Clone)]
pub struct Submission {
    pub candidate: Candidate,
    pub reply: String,
}

impl Submission {
    pub fn new(candidate: Candidate, reply: impl Into<String>) -> Self {
        Self {
            candidate,
            reply: reply.into(),
        }
    }

    pub fn thread_id(&self) -> &str {
        self.candidate.id()
    }
}

/// Real (or simulated) accounting: who was replied to, how many today, when last.
#[derive(Debug, Clone, PartialEq)]
pub struct PostingState {
    day: NaiveDate,
    posted_today: u32,
    last_publish: Option<DateTime<Utc>>,
    published: HashSet<ThreadId>,
}

impl PostingState {
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            day: today,
            posted_today: 0,
            last_publish: None,
            published: HashSet::new(),
        }
    }

    /// Rebuild from persisted history. Where records and summary disagree the
    /// stricter value wins: union of ids, larger count, later timestamp.
    pub fn rebuild(
        records: &[PublishRecord],
        summary: Option<&PostingSummary>,
        today: NaiveDate,
    ) -> Self {
        let mut st = Self::empty(today);
        for r in records.iter().filter(|r| r.counts_as_published()) {
            st.published.insert(r.thread_id.clone());
            if r.published_at.date_naive() == today {
                st.posted_today += 1;
            }
            st.last_publish = st.last_publish.max(Some(r.published_at));
        }
        if let Some(s) = summary {
            st.published.extend(s.published_ids.iter().cloned());
            if s.day == Some(today) {
                st.posted_today = st.posted_today.max(s.posted_today);
            }
            st.last_publish = st.last_publish.max(s.last_publish);
        }
        st
    }

    /// Reset the daily count when the calendar day moves forward.
    pub fn roll_day(&mut self, today: NaiveDate) {
        if today > self.day {
            self.day = today;
            self.posted_today = 0;
        }
    }

    fn commit(&mut self, thread_id: &str, at: DateTime<Utc>) {
        self.roll_day(at.date_naive());
        self.published.insert(thread_id.to_string());
        self.posted_today += 1;
        self.last_publish = Some(at);
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Count for `today`, zero if the state has not rolled over yet.
    pub fn posted_on(&self, today: NaiveDate) -> u32 {
        if today > self.day {
            0
        } else {
            self.posted_today
        }
    }

    pub fn posted_today(&self) -> u32 {
        self.posted_today
    }

    pub fn last_publish(&self) -> Option<DateTime<Utc>> {
        self.last_publish
    }

    pub fn is_published(&self, thread_id: &str) -> bool {
        self.published.contains(thread_id)
    }

    pub fn published_count(&self) -> usize {
        self.published.len()
    }

    fn summary(&self, at: DateTime<Utc>) -> PostingSummary {
        let mut ids: Vec<String> = self.published.iter().cloned().collect();
        ids.sort();
        PostingSummary {
            day: Some(self.day),
            posted_today: self.posted_today,
            last_publish: self.last_publish,
            published_ids: ids,
            updated_at: Some(at),
        }
    }
}

#[derive(Debug, Clone)]
struct Limits {
    daily_cap: u32,
    min_interval: Duration,
    dry_run: bool,
    pace_batch: bool,
    publish_timeout: StdDuration,
}

enum Gate {
    Duplicate(&'static str),
    DailyCap,
    RateLimited(DateTime<Utc>),
    Clear,
}

/// One set of books. Live mode writes the real ledger; dry-run writes a
/// simulated copy seeded from it.
#[derive(Debug)]
struct Ledger {
    state: PostingState,
    replies: AntiSpam,
    store: HistoryStore,
    simulated: bool,
}

impl Ledger {
    fn real(mut store: HistoryStore, params: AntiSpamParams, today: NaiveDate) -> Self {
        let loaded = store.take_loaded();
        let state = PostingState::rebuild(&loaded, store.summary(), today);
        let window = params.window_size;
        let posted: Vec<&str> = loaded
            .iter()
            .filter(|r| r.counts_as_published())
            .map(|r| r.text.as_str())
            .collect();
        let start = posted.len().saturating_sub(window);
        let replies = AntiSpam::with_history(params, posted[start..].iter().copied());
        Self {
            state,
            replies,
            store,
            simulated: false,
        }
    }

    fn simulated_from(real: &Ledger) -> Self {
        Self {
            state: real.state.clone(),
            replies: real.replies.clone(),
            store: HistoryStore::in_memory(),
            simulated: true,
        }
    }

    fn gate(&mut self, thread_id: &str, reply: &str, now: DateTime<Utc>, limits: &Limits, cap_latched: bool) -> Gate {
        if self.state.is_published(thread_id) {
            return Gate::Duplicate("thread already replied to");
        }
        if self.replies.is_near_duplicate(reply) {
            return Gate::Duplicate("reply too similar to a recent one");
        }
        self.state.roll_day(now.date_naive());
        if cap_latched || self.state.posted_today >= limits.daily_cap {
            return Gate::DailyCap;
        }
        if let Some(last) = self.state.last_publish {
            let next = last
                .checked_add_signed(limits.min_interval)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            if now < next {
                return Gate::RateLimited(next);
            }
        }
        Gate::Clear
    }

    fn record(&mut self, record: &PublishRecord) {
        if let Err(e) = self.store.append(record) {
            tracing::error!(target: "scheduler", thread_id = %record.thread_id, error = %e, "failed to persist publish record");
        }
    }

    /// Commit a success. In-memory state moves even if persistence fails: the
    /// reply is already live and must never be sent twice.
    fn commit_posted(&mut self, record: &PublishRecord) {
        self.state.commit(&record.thread_id, record.published_at);
        self.replies.remember(&record.text);
        self.record(record);
        if !self.simulated {
            let summary = self.state.summary(record.published_at);
            if let Err(e) = self.store.write_summary(&summary) {
                tracing::error!(target: "scheduler", error = %e, "failed to persist posting summary");
            }
        }
    }
}

struct Inner {
    real: Ledger,
    sim: Option<Ledger>,
}

impl Inner {
    fn active(&mut self) -> &mut Ledger {
        match self.sim.as_mut() {
            Some(sim) => sim,
            None => &mut self.real,
        }
    }

    fn active_ref(&self) -> &Ledger {
        self.sim.as_ref().unwrap_or(&self.real)
    }
}

struct Shared {
    connector: Arc<dyn SourceConnector>,
    clock: Arc<dyn Clock>,
    stats: Arc<StatsTracker>,
    limits: Limits,
}

/// What happened to each submission of a batch.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BatchReport {
    pub records: Vec<PublishRecord>,
    /// Ids never evaluated because the batch was cancelled first.
    pub not_attempted: Vec<ThreadId>,
}

impl BatchReport {
    pub fn outcomes(&self) -> Vec<PublishOutcome> {
        self.records.iter().map(|r| r.outcome).collect()
    }

    pub fn count(&self, outcome: PublishOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Count per outcome, all five keys present.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        PublishOutcome::ALL
            .iter()
            .map(|o| (o.as_str(), self.count(*o)))
            .collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = &PublishRecord> {
        self.records
            .iter()
            .filter(|r| r.outcome == PublishOutcome::Failed)
    }

    /// Submissions accounted for, attempted or not.
    pub fn total(&self) -> usize {
        self.records.len() + self.not_attempted.len()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostingStatus {
    pub day: NaiveDate,
    pub posted_today: u32,
    pub daily_cap: u32,
    pub last_publish: Option<DateTime<Utc>>,
    pub next_publish_at: Option<DateTime<Utc>>,
    pub can_publish_now: bool,
    pub total_published: usize,
    pub dry_run: bool,
}

pub struct PostingScheduler {
    inner: Arc<Mutex<Inner>>,
    shared: Arc<Shared>,
}

impl PostingScheduler {
    pub fn new(
        cfg: &PostingConfig,
        store: HistoryStore,
        connector: Arc<dyn SourceConnector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_stats(cfg, store, connector, clock, Arc::new(StatsTracker::new()))
    }

    pub fn with_stats(
        cfg: &PostingConfig,
        store: HistoryStore,
        connector: Arc<dyn SourceConnector>,
        clock: Arc<dyn Clock>,
        stats: Arc<StatsTracker>,
    ) -> Self {
        let limits = Limits {
            daily_cap: cfg.daily_cap,
            // Out-of-range values clamp to the longest wait, never to a shorter one.
            min_interval: i64::try_from(cfg.min_post_interval_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            dry_run: cfg.dry_run,
            pace_batch: cfg.pace_batch,
            publish_timeout: StdDuration::from_secs(cfg.publish_timeout_secs),
        };
        let params = AntiSpamParams {
            window_size: cfg.reply_window,
            similarity_threshold: cfg.reply_similarity_threshold,
        };
        let today = clock.now().date_naive();
        let real = Ledger::real(store, params, today);
        tracing::info!(
            target: "scheduler",
            published = real.state.published_count(),
            posted_today = real.state.posted_today,
            dry_run = limits.dry_run,
            "posting state restored"
        );
        let sim = limits.dry_run.then(|| Ledger::simulated_from(&real));
        Self {
            inner: Arc::new(Mutex::new(Inner { real, sim })),
            shared: Arc::new(Shared {
                connector,
                clock,
                stats,
                limits,
            }),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.shared.limits.dry_run
    }

    pub fn stats(&self) -> Arc<StatsTracker> {
        Arc::clone(&self.shared.stats)
    }

    /// Decide and, if allowed, publish one submission. Never waits for the
    /// rate-limit window and never retries.
    pub async fn post_one(&self, submission: Submission) -> PublishRecord {
        self.run(submission, false).await
    }

    /// Process submissions in the given (ranked) order.
    ///
    /// With `pace_batch` a submission blocked only by the rate-limit window
    /// waits for it. After the first `skipped-daily-cap` the rest of the batch
    /// only gets the duplicate check. Cancellation is honoured between
    /// submissions and while waiting; unprocessed ids land in `not_attempted`.
    pub async fn post_batch(&self, submissions: Vec<Submission>, cancel: &CancelSignal) -> BatchReport {
        let mut report = BatchReport::default();
        let mut cap_latched = false;
        let mut pending = submissions.into_iter();

        while let Some(sub) = pending.next() {
            if cancel.is_cancelled() {
                report.not_attempted.push(sub.thread_id().to_string());
                break;
            }
            if self.shared.limits.pace_batch && !cap_latched {
                if let Some(until) = self.ready_at(&sub).await {
                    tracing::debug!(target: "scheduler", thread_id = %sub.thread_id(), %until, "waiting for rate-limit window");
                    tokio::select! {
                        _ = self.shared.clock.sleep_until(until) => {}
                        _ = cancel.cancelled() => {
                            report.not_attempted.push(sub.thread_id().to_string());
                            break;
                        }
                    }
                }
            }
            let record = self.run(sub, cap_latched).await;
            if record.outcome == PublishOutcome::SkippedDailyCap {
                cap_latched = true;
            }
            report.records.push(record);
        }
        report
            .not_attempted
            .extend(pending.map(|s| s.thread_id().to_string()));

        tracing::info!(
            target: "scheduler",
            posted = report.count(PublishOutcome::Posted),
            failed = report.count(PublishOutcome::Failed),
            skipped = report.records.len() - report.count(PublishOutcome::Posted) - report.count(PublishOutcome::Failed),
            not_attempted = report.not_attempted.len(),
            "batch finished"
        );
        report
    }

    /// When the submission is blocked only by the rate-limit window, the time
    /// the window opens.
    async fn ready_at(&self, sub: &Submission) -> Option<DateTime<Utc>> {
        let mut inner = self.inner.lock().await;
        let now = self.shared.clock.now();
        match inner
            .active()
            .gate(sub.thread_id(), &sub.reply, now, &self.shared.limits, false)
        {
            Gate::RateLimited(until) => Some(until),
            _ => None,
        }
    }

    async fn run(&self, sub: Submission, cap_latched: bool) -> PublishRecord {
        let guard = Arc::clone(&self.inner).lock_owned().await;
        let shared = Arc::clone(&self.shared);
        let thread_id = sub.thread_id().to_string();
        let group = sub.candidate.thread.group.clone();
        let text = sub.reply.clone();

        match tokio::spawn(attempt(guard, shared, sub, cap_latched)).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(target: "scheduler", %thread_id, error = %e, "publish task aborted");
                PublishRecord {
                    thread_id,
                    group,
                    published_at: self.shared.clock.now(),
                    outcome: PublishOutcome::Failed,
                    text,
                    simulated: self.shared.limits.dry_run,
                    detail: Some(format!("publish task aborted: {e}")),
                }
            }
        }
    }

    pub async fn status(&self) -> PostingStatus {
        let inner = self.inner.lock().await;
        let now = self.shared.clock.now();
        let limits = &self.shared.limits;
        let state = &inner.active_ref().state;
        let today = now.date_naive();
        let posted_today = state.posted_on(today);
        let next_publish_at = state.last_publish.map(|t| {
            t.checked_add_signed(limits.min_interval)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        let window_open = next_publish_at.map_or(true, |t| now >= t);
        PostingStatus {
            day: today,
            posted_today,
            daily_cap: limits.daily_cap,
            last_publish: state.last_publish,
            next_publish_at,
            can_publish_now: window_open && posted_today < limits.daily_cap,
            total_published: state.published_count(),
            dry_run: limits.dry_run,
        }
    }

    /// Most recent records of the active ledger, oldest first.
    pub async fn recent_records(&self, n: usize) -> Vec<PublishRecord> {
        self.inner.lock().await.active_ref().store.recent(n)
    }

    /// Real accounting, whatever the mode.
    pub async fn state(&self) -> PostingState {
        self.inner.lock().await.real.state.clone()
    }

    /// Simulated accounting, present only in dry-run.
    pub async fn simulated_state(&self) -> Option<PostingState> {
        self.inner.lock().await.sim.as_ref().map(|l| l.state.clone())
    }
}

async fn attempt(
    mut guard: OwnedMutexGuard<Inner>,
    shared: Arc<Shared>,
    sub: Submission,
    cap_latched: bool,
) -> PublishRecord {
    let limits = &shared.limits;
    let now = shared.clock.now();
    let ledger = guard.active();
    let thread_id = sub.thread_id().to_string();
    let reply_id = text_id(&sub.reply);

    let make = |outcome: PublishOutcome, at: DateTime<Utc>, detail: Option<String>| PublishRecord {
        thread_id: thread_id.clone(),
        group: sub.candidate.thread.group.clone(),
        published_at: at,
        outcome,
        text: sub.reply.clone(),
        simulated: limits.dry_run,
        detail,
    };

    let mut publish_elapsed = None;
    let record = match ledger.gate(&thread_id, &sub.reply, now, limits, cap_latched) {
        Gate::Duplicate(why) => {
            let r = make(PublishOutcome::SkippedDuplicate, now, Some(why.to_string()));
            ledger.record(&r);
            r
        }
        Gate::DailyCap => {
            let r = make(PublishOutcome::SkippedDailyCap, now, None);
            ledger.record(&r);
            r
        }
        Gate::RateLimited(next) => {
            let r = make(
                PublishOutcome::SkippedRateLimit,
                now,
                Some(format!("window opens at {}", next.to_rfc3339())),
            );
            ledger.record(&r);
            r
        }
        Gate::Clear if limits.dry_run => {
            let r = make(PublishOutcome::Posted, now, Some("dry-run".to_string()));
            ledger.commit_posted(&r);
            r
        }
        Gate::Clear => {
            let t0 = Instant::now();
            let res = tokio::time::timeout(
                limits.publish_timeout,
                shared.connector.publish(&thread_id, &sub.reply),
            )
            .await;
            publish_elapsed = Some(t0.elapsed());
            let done_at = shared.clock.now();
            match res {
                Ok(Ok(receipt)) => {
                    let r = make(PublishOutcome::Posted, done_at, receipt.permalink);
                    ledger.commit_posted(&r);
                    r
                }
                Ok(Err(e)) => {
                    tracing::warn!(target: "scheduler", %thread_id, error = %e, "publish failed");
                    let r = make(PublishOutcome::Failed, done_at, Some(e.reason()));
                    ledger.record(&r);
                    r
                }
                Err(_) => {
                    let reason = format!("publish timed out after {}s", limits.publish_timeout.as_secs());
                    tracing::warn!(target: "scheduler", %thread_id, %reason, "publish failed");
                    let r = make(PublishOutcome::Failed, done_at, Some(reason));
                    ledger.record(&r);
                    r
                }
            }
        }
    };

    tracing::info!(
        target: "scheduler",
        %thread_id,
        reply = %reply_id,
        outcome = %record.outcome,
        dry_run = limits.dry_run,
        "publish decision"
    );
    shared.stats.record_outcome(record.outcome, publish_elapsed);
    record
}
