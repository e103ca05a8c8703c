//! Cross-source ranking: threshold, dedup by thread id, one sort pass.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{batch_order, Candidate, ScoredBatch};

pub use crate::config::DEFAULT_RELEVANCE_THRESHOLD;

/// What the ranker dropped, so every input lands in exactly one bucket.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RankStats {
    pub input: usize,
    pub quality_failed: usize,
    pub below_threshold: usize,
    pub duplicates_collapsed: usize,
    pub kept: usize,
}

pub fn rank(candidates: Vec<Candidate>, quality_threshold: f32) -> ScoredBatch {
    rank_with_stats(candidates, quality_threshold).0
}

/// Drops candidates that failed quality or score below `quality_threshold`
/// (non-finite scores count as below), keeps the best-scoring instance of each
/// thread id, and sorts by `batch_order`.
pub fn rank_with_stats(
    candidates: Vec<Candidate>,
    quality_threshold: f32,
) -> (ScoredBatch, RankStats) {
    let mut stats = RankStats {
        input: candidates.len(),
        ..Default::default()
    };

    let mut best: HashMap<String, Candidate> = HashMap::with_capacity(candidates.len());
    for c in candidates {
        if !c.quality_passed {
            stats.quality_failed += 1;
            continue;
        }
        if !c.relevance_score.is_finite() || c.relevance_score < quality_threshold {
            stats.below_threshold += 1;
            continue;
        }
        match best.get_mut(&c.thread.id) {
            Some(existing) => {
                stats.duplicates_collapsed += 1;
                if c.relevance_score > existing.relevance_score {
                    *existing = c;
                }
            }
            None => {
                best.insert(c.thread.id.clone(), c);
            }
        }
    }

    let mut out: Vec<Candidate> = best.into_values().collect();
    out.sort_by(batch_order);
    stats.kept = out.len();
    (ScoredBatch::from_sorted(out), stats)
}
