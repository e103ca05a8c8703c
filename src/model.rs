//! Core data model: threads, scored candidates, ranked batches and publish records.
//!
//! All types here are plain data. `Thread` and `Candidate` are never mutated once
//! built; re-scoring a thread produces a new `Candidate`.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Platform-scoped thread identifier (e.g. a base36 post id).
pub type ThreadId = String;

/// One discoverable unit of user-generated content on the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    pub id: ThreadId,
    /// Source group the thread was found in (a subreddit, a forum board, ...).
    pub group: String,
    pub title: String,
    pub body: String,
    /// Net votes / likes as reported by the platform. May be negative.
    pub popularity: i64,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub is_text_post: bool,
    pub is_nsfw: bool,
}

impl Thread {
    /// Age at `now`. Timestamps in the future count as age zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        let age = now.signed_duration_since(self.created_at);
        if age < Duration::zero() {
            Duration::zero()
        } else {
            age
        }
    }
}

/// A thread annotated with its relevance score and quality verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub thread: Thread,
    pub relevance_score: f32,
    pub quality_passed: bool,
    /// Fingerprint of the business context the score was computed against.
    pub context_fingerprint: String,
}

impl Candidate {
    pub fn new(
        thread: Thread,
        relevance_score: f32,
        quality_passed: bool,
        context_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            thread,
            relevance_score,
            quality_passed,
            context_fingerprint: context_fingerprint.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.thread.id
    }
}

/// Batch ordering: higher score first, then more recent thread first.
/// The thread id is a final tie-breaker so ordering is total and stable.
pub fn batch_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| b.thread.created_at.cmp(&a.thread.created_at))
        .then_with(|| a.thread.id.cmp(&b.thread.id))
}

/// Ordered candidates of one discovery run.
///
/// Only the ranker builds these, so the ordering invariant (non-increasing
/// score, ties broken by newer thread first) and id uniqueness always hold.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ScoredBatch {
    candidates: Vec<Candidate>,
}

impl ScoredBatch {
    pub(crate) fn from_sorted(candidates: Vec<Candidate>) -> Self {
        debug_assert!(candidates
            .windows(2)
            .all(|w| batch_order(&w[0], &w[1]) != Ordering::Greater));
        Self { candidates }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Keep only the first `n` candidates; returns the ones cut off.
    pub fn truncate(&mut self, n: usize) -> Vec<Candidate> {
        if n >= self.candidates.len() {
            return Vec::new();
        }
        self.candidates.split_off(n)
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates
    }

    pub fn scores(&self) -> Vec<f32> {
        self.candidates.iter().map(|c| c.relevance_score).collect()
    }
}

impl IntoIterator for ScoredBatch {
    type Item = Candidate;
    type IntoIter = std::vec::IntoIter<Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

/// Outcome of one publish attempt. Exactly one per `PublishRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishOutcome {
    Posted,
    SkippedDuplicate,
    SkippedRateLimit,
    SkippedDailyCap,
    Failed,
}

impl PublishOutcome {
    pub const ALL: [PublishOutcome; 5] = [
        PublishOutcome::Posted,
        PublishOutcome::SkippedDuplicate,
        PublishOutcome::SkippedRateLimit,
        PublishOutcome::SkippedDailyCap,
        PublishOutcome::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PublishOutcome::Posted => "posted",
            PublishOutcome::SkippedDuplicate => "skipped-duplicate",
            PublishOutcome::SkippedRateLimit => "skipped-rate-limit",
            PublishOutcome::SkippedDailyCap => "skipped-daily-cap",
            PublishOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only history entry for one publish attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishRecord {
    pub thread_id: ThreadId,
    #[serde(default)]
    pub group: String,
    pub published_at: DateTime<Utc>,
    pub outcome: PublishOutcome,
    /// Reply text that was (or would have been) published.
    pub text: String,
    /// True for dry-run records; these never touch real accounting.
    #[serde(default)]
    pub simulated: bool,
    /// Failure reason or remote permalink, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PublishRecord {
    pub fn counts_as_published(&self) -> bool {
        self.outcome == PublishOutcome::Posted && !self.simulated
    }
}

/// Which backend the source connector ended up on. Decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorMode {
    Live,
    Fallback,
}

impl fmt::Display for ConnectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorMode::Live => f.write_str("live"),
            ConnectorMode::Fallback => f.write_str("fallback"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cand(id: &str, score: f32, created_secs: i64) -> Candidate {
        Candidate::new(
            Thread {
                id: id.into(),
                group: "g".into(),
                title: "t".into(),
                body: "b".into(),
                popularity: 1,
                created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
                author: "a".into(),
                is_text_post: true,
                is_nsfw: false,
            },
            score,
            true,
            "fp",
        )
    }

    #[test]
    fn order_prefers_score_then_recency() {
        let a = cand("a", 0.9, 100);
        let b = cand("b", 0.7, 500);
        let c = cand("c", 0.7, 900);
        let mut v = vec![b.clone(), a.clone(), c.clone()];
        v.sort_by(batch_order);
        let ids: Vec<_> = v.iter().map(|c| c.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn outcome_serializes_kebab_case() {
        let s = serde_json::to_string(&PublishOutcome::SkippedDailyCap).unwrap();
        assert_eq!(s, "\"skipped-daily-cap\"");
        for o in PublishOutcome::ALL {
            let back: PublishOutcome =
                serde_json::from_str(&format!("\"{}\"", o.as_str())).unwrap();
            assert_eq!(back, o);
        }
    }

    #[test]
    fn future_timestamps_have_zero_age() {
        let t = cand("x", 0.1, 1_000).thread;
        let now = Utc.timestamp_opt(500, 0).unwrap();
        assert_eq!(t.age_at(now), Duration::zero());
    }
}
