//! One discovery-filter-score-rank-compose-publish cycle.
//!
//! Fetches run on a bounded pool (`fetch_concurrency` permits). Each worker
//! checks for cancellation before it starts its fetch, applies the quality
//! gate and scores what it fetched, and hands back candidates. Ranking,
//! composition and publishing then run in order on the calling task.
//!
//! Every fetched thread ends up in exactly one bucket of the `CycleReport`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::analyze::{rank_with_stats, KeywordSet, QualityFilter, RankStats, RelevanceScorer, ReplyReviewer};
use crate::cancel::CancelSignal;
use crate::clock::Clock;
use crate::compose::DynComposer;
use crate::config::ScoutConfig;
use crate::context::BusinessContext;
use crate::model::{Candidate, ConnectorMode, ScoredBatch, ThreadId};
use crate::scheduler::{BatchReport, PostingScheduler, Submission};
use crate::source::{Connection, SearchQuery, SourceConnector};
use crate::stats::StatsTracker;
use crate::terms::{search_terms, target_groups};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupFailure {
    pub group: String,
    pub reason: String,
}

/// A thread id with the reason it stopped where it did.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ThreadNote {
    pub thread_id: ThreadId,
    pub reason: String,
}

/// Result of the fetch/filter/score/rank half of a cycle.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub groups: Vec<String>,
    pub fetched: usize,
    pub failed_groups: Vec<GroupFailure>,
    pub skipped_groups: Vec<String>,
    pub quality_rejected: Vec<ThreadNote>,
    pub rank: RankStats,
    pub batch: ScoredBatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub mode: ConnectorMode,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub groups: Vec<String>,
    pub fetched: usize,
    pub failed_groups: Vec<GroupFailure>,
    /// Groups never fetched because the cycle was cancelled.
    pub skipped_groups: Vec<String>,
    pub quality_rejected: Vec<ThreadNote>,
    pub below_threshold: usize,
    pub duplicates_collapsed: usize,
    /// Ranked above threshold but past the per-cycle candidate limit.
    pub deferred: Vec<ThreadId>,
    pub compose_failed: Vec<ThreadNote>,
    pub rejected_replies: Vec<ThreadNote>,
    pub batch: BatchReport,
}

impl CycleReport {
    /// True when the buckets add up to the number of fetched threads.
    pub fn is_balanced(&self) -> bool {
        let accounted = self.quality_rejected.len()
            + self.below_threshold
            + self.duplicates_collapsed
            + self.deferred.len()
            + self.compose_failed.len()
            + self.rejected_replies.len()
            + self.batch.total();
        accounted == self.fetched
    }
}

enum GroupResult {
    Fetched {
        group: String,
        fetched: usize,
        candidates: Vec<Candidate>,
        rejected: Vec<ThreadNote>,
    },
    Failed(GroupFailure),
    Skipped(String),
}

/// Read-only pieces every fetch worker needs.
struct Scoring {
    filter: QualityFilter,
    scorer: RelevanceScorer,
    keywords: KeywordSet,
    context: BusinessContext,
    fingerprint: String,
    min_popularity: i64,
    now: DateTime<Utc>,
}

pub struct Pipeline {
    config: ScoutConfig,
    connection: Connection,
    scheduler: Arc<PostingScheduler>,
    composer: DynComposer,
    clock: Arc<dyn Clock>,
    stats: Arc<StatsTracker>,
    filter: QualityFilter,
    scorer: RelevanceScorer,
    reviewer: ReplyReviewer,
}

impl Pipeline {
    pub fn new(
        config: ScoutConfig,
        connection: Connection,
        scheduler: Arc<PostingScheduler>,
        composer: DynComposer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let stats = scheduler.stats();
        Self {
            filter: QualityFilter::new(&config.filter),
            scorer: RelevanceScorer::new(&config.scoring),
            reviewer: ReplyReviewer::new(&config.reply),
            config,
            connection,
            scheduler,
            composer,
            clock,
            stats,
        }
    }

    pub fn mode(&self) -> ConnectorMode {
        self.connection.mode()
    }

    pub fn scheduler(&self) -> Arc<PostingScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Plan, fetch (bounded, cancellable), filter, score and rank.
    pub async fn discover(&self, context: &BusinessContext, cancel: &CancelSignal) -> Discovery {
        let d = &self.config.discovery;
        let groups = target_groups(context, d.group_limit);
        let terms = search_terms(context);
        let scoring = Arc::new(Scoring {
            filter: self.filter.clone(),
            scorer: self.scorer.clone(),
            keywords: KeywordSet::merged(&self.config.scoring.keywords, context),
            context: context.clone(),
            fingerprint: context.fingerprint(),
            min_popularity: self.config.filter.min_popularity,
            now: self.clock.now(),
        });
        tracing::info!(
            target: "pipeline",
            groups = groups.len(),
            terms = terms.len(),
            keywords = scoring.keywords.len(),
            mode = %self.connection.mode(),
            "discovery started"
        );

        let permits = Arc::new(Semaphore::new(d.fetch_concurrency.max(1)));
        let fetch_timeout = Duration::from_secs(d.fetch_timeout_secs);
        let max_age = Duration::from_secs(u64::from(d.max_age_days) * 86_400);
        let mut set = JoinSet::new();
        let mut names: HashMap<tokio::task::Id, String> = HashMap::new();

        for group in &groups {
            let query = SearchQuery {
                group: group.clone(),
                terms: terms.clone(),
                limit: d.search_limit,
                min_popularity_hint: self.config.filter.min_popularity,
                max_age_hint: max_age,
            };
            let handle = set.spawn(fetch_group(
                Arc::clone(&permits),
                self.connection.connector(),
                Arc::clone(&scoring),
                Arc::clone(&self.stats),
                cancel.clone(),
                query,
                fetch_timeout,
            ));
            names.insert(handle.id(), group.clone());
        }

        let mut out = Discovery {
            groups: groups.clone(),
            ..Default::default()
        };
        let mut candidates = Vec::new();
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, GroupResult::Fetched { group, fetched, candidates: mut c, rejected })) => {
                    tracing::debug!(target: "pipeline", %group, fetched, rejected = rejected.len(), "group done");
                    out.fetched += fetched;
                    candidates.append(&mut c);
                    out.quality_rejected.extend(rejected);
                }
                Ok((_, GroupResult::Failed(f))) => {
                    tracing::warn!(target: "pipeline", group = %f.group, reason = %f.reason, "group fetch failed");
                    out.failed_groups.push(f);
                }
                Ok((_, GroupResult::Skipped(group))) => out.skipped_groups.push(group),
                Err(e) => {
                    let group = names.get(&e.id()).cloned().unwrap_or_default();
                    tracing::error!(target: "pipeline", %group, error = %e, "fetch worker aborted");
                    out.failed_groups.push(GroupFailure {
                        group,
                        reason: format!("worker aborted: {e}"),
                    });
                }
            }
        }

        let (batch, rank) = rank_with_stats(candidates, self.config.scoring.threshold);
        self.stats.record_rank(&rank);
        out.rank = rank;
        out.batch = batch;
        tracing::info!(
            target: "pipeline",
            fetched = out.fetched,
            failed_groups = out.failed_groups.len(),
            quality_rejected = out.quality_rejected.len(),
            below_threshold = rank.below_threshold,
            kept = rank.kept,
            "discovery finished"
        );
        out
    }

    /// Run a full cycle for `context`.
    pub async fn run_cycle(&self, context: &BusinessContext, cancel: &CancelSignal) -> CycleReport {
        let started_at = self.clock.now();
        let Discovery {
            groups,
            fetched,
            failed_groups,
            skipped_groups,
            quality_rejected,
            rank,
            mut batch,
        } = self.discover(context, cancel).await;

        let deferred: Vec<ThreadId> = batch
            .truncate(self.config.discovery.max_candidates)
            .into_iter()
            .map(|c| c.thread.id)
            .collect();

        let mut compose_failed = Vec::new();
        let mut rejected_replies = Vec::new();
        let mut submissions = Vec::with_capacity(batch.len());
        let mut not_composed = Vec::new();
        let compose_timeout = Duration::from_secs(self.config.reply.compose_timeout_secs);
        let style = self.config.reply.style;

        for candidate in batch {
            if cancel.is_cancelled() {
                not_composed.push(candidate.thread.id);
                continue;
            }
            let t0 = Instant::now();
            let res = tokio::time::timeout(
                compose_timeout,
                self.composer.compose(&candidate.thread, context, style),
            )
            .await;
            let elapsed = t0.elapsed();
            let thread_id = candidate.thread.id.clone();
            match res {
                Ok(Ok(reply)) => {
                    self.stats.record_compose(true, elapsed);
                    match self.reviewer.review(&reply) {
                        Ok(()) => submissions.push(Submission::new(candidate, reply)),
                        Err(issue) => {
                            self.stats.record_reply_rejected();
                            tracing::info!(target: "pipeline", %thread_id, reason = %issue, "reply rejected");
                            rejected_replies.push(ThreadNote {
                                thread_id,
                                reason: issue.to_string(),
                            });
                        }
                    }
                }
                Ok(Err(e)) => {
                    self.stats.record_compose(false, elapsed);
                    tracing::warn!(target: "compose", %thread_id, error = %e, "compose failed");
                    compose_failed.push(ThreadNote {
                        thread_id,
                        reason: e.reason(),
                    });
                }
                Err(_) => {
                    self.stats.record_compose(false, elapsed);
                    let reason = format!("compose timed out after {}s", compose_timeout.as_secs());
                    tracing::warn!(target: "compose", %thread_id, %reason, "compose failed");
                    compose_failed.push(ThreadNote { thread_id, reason });
                }
            }
        }

        let mut batch_report = self.scheduler.post_batch(submissions, cancel).await;
        batch_report.not_attempted.extend(not_composed);

        let finished_at = self.clock.now();
        self.stats.record_cycle(finished_at);

        let report = CycleReport {
            mode: self.connection.mode(),
            dry_run: self.scheduler.is_dry_run(),
            started_at,
            finished_at,
            groups,
            fetched,
            failed_groups,
            skipped_groups,
            quality_rejected,
            below_threshold: rank.below_threshold,
            duplicates_collapsed: rank.duplicates_collapsed,
            deferred,
            compose_failed,
            rejected_replies,
            batch: batch_report,
        };
        if !report.is_balanced() {
            tracing::error!(target: "pipeline", fetched = report.fetched, "cycle buckets do not add up");
        }
        tracing::info!(
            target: "pipeline",
            fetched = report.fetched,
            posted = report.batch.count(crate::model::PublishOutcome::Posted),
            failed = report.batch.count(crate::model::PublishOutcome::Failed),
            "cycle finished"
        );
        report
    }
}

async fn fetch_group(
    permits: Arc<Semaphore>,
    connector: Arc<dyn SourceConnector>,
    scoring: Arc<Scoring>,
    stats: Arc<StatsTracker>,
    cancel: CancelSignal,
    query: SearchQuery,
    timeout: Duration,
) -> GroupResult {
    let group = query.group.clone();
    let Ok(_permit) = permits.acquire_owned().await else {
        return GroupResult::Skipped(group);
    };
    if cancel.is_cancelled() {
        return GroupResult::Skipped(group);
    }

    let t0 = Instant::now();
    let res = tokio::time::timeout(timeout, connector.search(&query)).await;
    let elapsed = t0.elapsed();
    let threads = match res {
        Ok(Ok(threads)) => threads,
        Ok(Err(e)) => {
            stats.record_fetch(false, 0, elapsed);
            return GroupResult::Failed(GroupFailure {
                group,
                reason: e.reason(),
            });
        }
        Err(_) => {
            stats.record_fetch(false, 0, elapsed);
            return GroupResult::Failed(GroupFailure {
                group,
                reason: format!("fetch timed out after {}s", timeout.as_secs()),
            });
        }
    };
    stats.record_fetch(true, threads.len(), elapsed);

    let fetched = threads.len();
    let mut candidates = Vec::with_capacity(fetched);
    let mut rejected = Vec::new();
    for thread in threads {
        match scoring.filter.verdict(&thread, scoring.min_popularity) {
            Ok(()) => candidates.push(scoring.scorer.candidate(
                thread,
                &scoring.keywords,
                &scoring.context,
                scoring.now,
                true,
            )),
            Err(why) => {
                stats.record_quality_rejection(why.label());
                rejected.push(ThreadNote {
                    thread_id: thread.id.clone(),
                    reason: why.to_string(),
                });
                candidates.push(Candidate::new(thread, 0.0, false, scoring.fingerprint.clone()));
            }
        }
    }
    GroupResult::Fetched {
        group,
        fetched,
        candidates,
        rejected,
    }
}
