// src/analyze/relevance.rs
//! Marketing-opportunity relevance scoring.
//!
//! Score = high-intent title phrase + problem-statement body phrase
//!       + per-keyword hits (higher when next to "good"/"best")
//!       + pain-point word hits + question-title bonus
//!       + recency bonus (full under 24h, linear fade to zero at the horizon)
//!       + capped engagement bonus
//!       - penalties for joke/rant and already-promotional threads,
//! clamped to `[0, max_score]`.
//!
//! Every positive term is non-negative and the recency term is non-increasing
//! in age, so more keyword hits never lower a score and an older thread never
//! scores higher than the same thread younger.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::{ScoringConfig, ScoringWeights};
use crate::context::BusinessContext;
use crate::model::{Candidate, Thread};

pub const HIGH_INTENT_PHRASES: &[&str] = &[
    "looking for",
    "recommend",
    "best tool for",
    "what should i use",
    "any good",
    "help me find",
];

pub const PROBLEM_PHRASES: &[&str] = &[
    "struggling with",
    "having trouble",
    "can't figure out",
    "stuck on",
    "frustrated with",
];

/// Threads that are jokes, rants or bait rather than requests.
static RE_NEGATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(meme|shitpost|circlejerk|troll|roast me|unpopular opinion|change my mind|just venting)\b")
        .expect("negative-indicator regex")
});

/// Threads that already advertise something.
static RE_PROMOTIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(my product|our solution|affiliate|discount code|use my code)\b")
        .expect("promotional-indicator regex")
});

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w+\b").expect("word regex"));

const FULL_RECENCY_HOURS: i64 = 24;

#[derive(Debug)]
struct KeywordPattern {
    keyword: String,
    plain: Regex,
    in_context: Regex,
}

/// Keywords compiled once per cycle; shared read-only by all scoring workers.
#[derive(Debug, Default)]
pub struct KeywordSet {
    entries: Vec<KeywordPattern>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for kw in keywords {
            let kw = kw.as_ref().trim().to_lowercase();
            if kw.is_empty() || !seen.insert(kw.clone()) {
                continue;
            }
            let esc = regex::escape(&kw);
            // Escaped input always compiles.
            let (Ok(plain), Ok(in_context)) = (
                Regex::new(&format!(r"(?i)(?:^|\W){esc}(?:\W|$)")),
                Regex::new(&format!(r"(?i)(?:^|\W)(?:good|best)\s+{esc}(?:\W|$)")),
            ) else {
                continue;
            };
            entries.push(KeywordPattern {
                keyword: kw,
                plain,
                in_context,
            });
        }
        Self { entries }
    }

    /// Config keywords plus the business context's own keywords.
    pub fn merged(config_keywords: &[String], context: &BusinessContext) -> Self {
        Self::new(config_keywords.iter().chain(context.keywords.iter()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-signal contributions, kept for debugging and tests.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ScoreBreakdown {
    pub high_intent: f32,
    pub problem_statement: f32,
    pub keywords: f32,
    pub matched_keywords: Vec<String>,
    pub pain_points: f32,
    pub question_title: f32,
    pub recency: f32,
    pub engagement: f32,
    pub penalties: f32,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    weights: ScoringWeights,
    recency_horizon: Duration,
}

impl RelevanceScorer {
    pub fn new(cfg: &ScoringConfig) -> Self {
        Self {
            weights: cfg.weights,
            recency_horizon: i64::try_from(cfg.recency_horizon_hours)
                .ok()
                .and_then(Duration::try_hours)
                .unwrap_or(Duration::MAX),
        }
    }

    pub fn score(
        &self,
        thread: &Thread,
        keywords: &KeywordSet,
        context: &BusinessContext,
        now: DateTime<Utc>,
    ) -> f32 {
        self.explain(thread, keywords, context, now).score
    }

    /// Build the candidate for a thread that went through the quality gate.
    pub fn candidate(
        &self,
        thread: Thread,
        keywords: &KeywordSet,
        context: &BusinessContext,
        now: DateTime<Utc>,
        quality_passed: bool,
    ) -> Candidate {
        let score = self.score(&thread, keywords, context, now);
        Candidate::new(thread, score, quality_passed, context.fingerprint())
    }

    pub fn explain(
        &self,
        thread: &Thread,
        keywords: &KeywordSet,
        context: &BusinessContext,
        now: DateTime<Utc>,
    ) -> ScoreBreakdown {
        let w = &self.weights;
        let title = normalize(&thread.title);
        let body = normalize(&thread.body);
        let full = format!("{title} {body}");
        let mut b = ScoreBreakdown::default();

        if HIGH_INTENT_PHRASES.iter().any(|p| title.contains(p)) {
            b.high_intent = w.high_intent;
        }
        if PROBLEM_PHRASES.iter().any(|p| body.contains(p)) {
            b.problem_statement = w.problem_statement;
        }

        for k in &keywords.entries {
            if k.in_context.is_match(&full) {
                b.keywords += w.keyword_in_context;
                b.matched_keywords.push(k.keyword.clone());
            } else if k.plain.is_match(&full) {
                b.keywords += w.keyword;
                b.matched_keywords.push(k.keyword.clone());
            }
        }

        let words: HashSet<&str> = RE_WORD.find_iter(&full).map(|m| m.as_str()).collect();
        let mut pain_words = HashSet::new();
        for pp in &context.pain_points {
            let pp = pp.to_lowercase();
            for m in RE_WORD.find_iter(&pp) {
                if m.as_str().chars().count() > 3 {
                    pain_words.insert(m.as_str().to_string());
                }
            }
        }
        let pain_hits = pain_words
            .iter()
            .filter(|w| words.contains(w.as_str()))
            .count();
        b.pain_points = pain_hits as f32 * w.pain_point_word;

        if thread.title.contains('?') {
            b.question_title = w.question_title;
        }

        b.recency = recency_bonus(thread.age_at(now), self.recency_horizon, w.recency_max);
        b.engagement = (thread.popularity.max(0) as f32 * w.engagement_per_point).min(w.engagement_cap);

        if RE_NEGATIVE.is_match(&full) {
            b.penalties += w.negative_penalty;
        }
        if RE_PROMOTIONAL.is_match(&full) {
            b.penalties += w.promotional_penalty;
        }

        let raw = b.high_intent
            + b.problem_statement
            + b.keywords
            + b.pain_points
            + b.question_title
            + b.recency
            + b.engagement
            - b.penalties;
        b.score = if raw.is_finite() {
            raw.clamp(0.0, w.max_score)
        } else {
            0.0
        };
        b
    }
}

/// Full bonus up to 24h, then a linear fade reaching zero at `horizon`.
pub fn recency_bonus(age: Duration, horizon: Duration, max: f32) -> f32 {
    if age >= horizon {
        return 0.0;
    }
    let full = Duration::hours(FULL_RECENCY_HOURS);
    if age <= full {
        return max;
    }
    let span = (horizon - full).num_seconds() as f32;
    let left = (horizon - age).num_seconds() as f32;
    if span <= 0.0 {
        return 0.0;
    }
    (max * left / span).clamp(0.0, max)
}

fn normalize(s: &str) -> String {
    s.to_lowercase().replace(['\u{2018}', '\u{2019}'], "'")
}
