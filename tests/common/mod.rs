// tests/common/mod.rs
//
// Shared fixtures: an in-memory recording connector and thread/candidate builders.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use thread_scout::clock::ManualClock;
use thread_scout::config::PostingConfig;
use thread_scout::history::HistoryStore;
use thread_scout::source::{PublishReceipt, SearchQuery, SourceConnector};
use thread_scout::{Candidate, PostingScheduler, ScoutError, Submission, Thread};

/// Fixed start instant, mid-morning UTC so day rollover is explicit in tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap()
}

pub fn thread(id: &str, group: &str, title: &str, body: &str, popularity: i64, created_at: DateTime<Utc>) -> Thread {
    Thread {
        id: id.into(),
        group: group.into(),
        title: title.into(),
        body: body.into(),
        popularity,
        created_at,
        author: "someone".into(),
        is_text_post: true,
        is_nsfw: false,
    }
}

pub fn candidate(id: &str, score: f32) -> Candidate {
    let t = thread(
        id,
        "smallbusiness",
        "Looking for a task tracker?",
        "We keep missing deadlines, any advice on tools?",
        20,
        t0(),
    );
    Candidate::new(t, score, true, "ctx")
}

const REPLIES: &[&str] = &[
    "A shared kanban board fixed most of our deadline chaos.",
    "Try writing the weekly priorities on one page every Monday morning.",
    "We moved invoices into a spreadsheet with reminders and it stuck.",
    "Honestly the biggest win was one owner per task, tooling came later.",
    "Calendar blocking two focus hours a day helped our tiny team a lot.",
    "Look at lightweight CRMs before anything enterprise, setup time matters.",
    "Automate the single most repetitive step first and measure the hours saved.",
    "Daily five minute standups over chat kept everyone honest about blockers.",
];

/// A reply text far enough from every other fixture reply to pass the
/// near-duplicate guard.
pub fn reply(i: usize) -> String {
    REPLIES[i % REPLIES.len()].to_string()
}

pub fn submission(id: &str, i: usize) -> Submission {
    Submission::new(candidate(id, 0.9), reply(i))
}

/// Records publishes, optionally fails for chosen ids, optionally hangs.
#[derive(Default)]
pub struct RecordingConnector {
    pub threads: Vec<Thread>,
    pub fail_ids: HashSet<String>,
    pub fail_groups: HashSet<String>,
    pub publish_delay: Option<Duration>,
    pub(crate) publishes: AtomicUsize,
    pub(crate) published: Mutex<Vec<String>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(threads: Vec<Thread>) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    pub fn failing(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn publish_calls(&self) -> usize {
        self.publishes.load(Ordering::SeqCst)
    }

    pub fn published_ids(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceConnector for RecordingConnector {
    async fn search(&self, query: &SearchQuery) -> thread_scout::Result<Vec<Thread>> {
        if self.fail_groups.contains(&query.group) {
            return Err(ScoutError::fetch(&query.group, "HTTP 503"));
        }
        Ok(self
            .threads
            .iter()
            .filter(|t| t.group == query.group)
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn publish(&self, thread_id: &str, _text: &str) -> thread_scout::Result<PublishReceipt> {
        self.publishes.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.publish_delay {
            tokio::time::sleep(d).await;
        }
        if self.fail_ids.contains(thread_id) {
            return Err(ScoutError::publish(thread_id, "rejected by platform"));
        }
        self.published.lock().unwrap().push(thread_id.to_string());
        Ok(PublishReceipt {
            remote_id: Some(format!("c_{thread_id}")),
            permalink: None,
            simulated: false,
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub fn posting(dry_run: bool) -> PostingConfig {
    PostingConfig {
        dry_run,
        ..PostingConfig::default()
    }
}

pub fn scheduler(
    cfg: &PostingConfig,
    store: HistoryStore,
    connector: Arc<RecordingConnector>,
    clock: Arc<ManualClock>,
) -> PostingScheduler {
    PostingScheduler::new(cfg, store, connector, clock)
}
