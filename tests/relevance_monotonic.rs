// tests/relevance_monotonic.rs
//
// Relevance score properties:
// - never lower when more configured keywords appear
// - never higher for an older copy of the same thread
// - always within [0, max_score]
// - high-intent and problem-statement threads outrank chatter

mod common;

use chrono::Duration;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use common::{t0, thread};
use thread_scout::analyze::{KeywordSet, RelevanceScorer};
use thread_scout::config::ScoringConfig;
use thread_scout::BusinessContext;

const KEYWORDS: &[&str] = &["crm", "invoicing", "task tracking", "time tracking", "payroll", "scheduling"];

fn ctx() -> BusinessContext {
    BusinessContext {
        product_summary: "TaskPilot".into(),
        pain_points: vec!["missed deadlines".into()],
        ..Default::default()
    }
}

#[test]
fn more_keyword_hits_never_lower_the_score() {
    let scorer = RelevanceScorer::new(&ScoringConfig::default());
    let kw = KeywordSet::new(KEYWORDS.iter().copied());
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..100 {
        let mut words: Vec<&str> = KEYWORDS.to_vec();
        words.shuffle(&mut rng);
        let age = Duration::hours(rng.random_range(0..240));
        let mut prev = -1.0f32;
        for n in 0..=words.len() {
            let body = format!("Need advice about our setup. Topics: {}.", words[..n].join(", "));
            let t = thread("k", "smallbusiness", "Which tools?", &body, 8, t0() - age);
            let s = scorer.score(&t, &kw, &ctx(), t0());
            assert!(s >= prev, "score dropped from {prev} to {s} after adding {:?}", words.get(n.wrapping_sub(1)));
            prev = s;
        }
    }
}

#[test]
fn older_threads_never_score_higher() {
    let scorer = RelevanceScorer::new(&ScoringConfig::default());
    let kw = KeywordSet::new(["crm"]);
    let mut prev = f32::MAX;
    for hours in (0..=24 * 10).step_by(6) {
        let t = thread(
            "a",
            "smallbusiness",
            "Looking for a CRM?",
            "Struggling with our crm, any advice?",
            15,
            t0() - Duration::hours(hours),
        );
        let s = scorer.score(&t, &kw, &ctx(), t0());
        assert!(s <= prev, "age {hours}h scored {s} > {prev}");
        prev = s;
    }
}

#[test]
fn scores_stay_in_range() {
    let cfg = ScoringConfig::default();
    let max = cfg.weights.max_score;
    let scorer = RelevanceScorer::new(&cfg);
    let kw = KeywordSet::new(KEYWORDS.iter().copied());
    let loud = thread(
        "x",
        "smallbusiness",
        "Looking for the best tool for crm? Recommend anything!",
        "Struggling with crm, invoicing, task tracking, time tracking, payroll and scheduling. Missed deadlines everywhere.",
        100_000,
        t0(),
    );
    let rant = thread("y", "smallbusiness", "Just venting", "This meme is my product, use my code", -50, t0());
    for t in [&loud, &rant] {
        let s = scorer.score(t, &kw, &ctx(), t0());
        assert!((0.0..=max).contains(&s), "{s} outside [0, {max}]");
    }
    assert_eq!(scorer.score(&rant, &kw, &ctx(), t0()), 0.0);
}

#[test]
fn help_requests_outrank_chatter() {
    let scorer = RelevanceScorer::new(&ScoringConfig::default());
    let kw = KeywordSet::new(["crm"]);
    let ask = thread(
        "ask",
        "smallbusiness",
        "Looking for a simple CRM",
        "Having trouble keeping track of clients, any advice?",
        10,
        t0() - Duration::hours(3),
    );
    let chat = thread(
        "chat",
        "smallbusiness",
        "Weekend plans",
        "Anyone doing anything fun? Need ideas.",
        10,
        t0() - Duration::hours(3),
    );
    let a = scorer.score(&ask, &kw, &ctx(), t0());
    let c = scorer.score(&chat, &kw, &ctx(), t0());
    assert!(a >= 0.5, "help request should clear the default threshold, got {a}");
    assert!(c < 0.5, "chatter should stay under the threshold, got {c}");
}
