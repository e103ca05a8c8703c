// tests/quality_filter.rs
//
// Quality gate: boundary cases and determinism.

mod common;

use common::{t0, thread};
use thread_scout::analyze::{QualityFilter, Rejection};
use thread_scout::config::FilterConfig;
use thread_scout::Thread;

fn filter() -> QualityFilter {
    QualityFilter::new(&FilterConfig::default())
}

fn good() -> Thread {
    thread(
        "q",
        "smallbusiness",
        "Invoicing tool?",
        "Looking for a simple invoicing tool for a two person shop.",
        5,
        t0(),
    )
}

#[test]
fn accepts_a_plain_help_request_at_the_popularity_floor() {
    assert!(filter().accept(&good(), 5));
}

#[test]
fn rejects_below_the_popularity_floor() {
    let r = filter().verdict(&good(), 6);
    assert_eq!(r, Err(Rejection::LowPopularity { popularity: 5, min: 6 }));
}

#[test]
fn body_length_bounds_are_inclusive() {
    let f = filter();
    let mut t = good();
    t.body = format!("help {}", "x".repeat(15));
    assert_eq!(t.body.chars().count(), 20);
    assert!(f.accept(&t, 0));

    t.body = "help me pls".into();
    assert!(matches!(f.verdict(&t, 0), Err(Rejection::TooShort { .. })));

    t.body = format!("help {}", "y".repeat(1995));
    assert!(f.accept(&t, 0));
    t.body.push('z');
    assert!(matches!(f.verdict(&t, 0), Err(Rejection::TooLong { chars: 2001 })));
}

#[test]
fn surrounding_whitespace_counts_toward_body_length() {
    let f = filter();
    let mut t = good();
    t.body = format!("  help {}  ", "x".repeat(11));
    assert_eq!(t.body.trim().chars().count(), 16);
    assert!(f.accept(&t, 0));

    t.body = format!("help {}\n\n", "y".repeat(1994));
    assert_eq!(t.body.trim().chars().count(), 1999);
    assert!(matches!(f.verdict(&t, 0), Err(Rejection::TooLong { chars: 2001 })));

    let mut removed = good();
    removed.body = "  [deleted]\n".into();
    assert_eq!(f.verdict(&removed, 0), Err(Rejection::Removed));
}

#[test]
fn link_posts_removed_bodies_and_nsfw_are_rejected() {
    let f = filter();
    let mut link = good();
    link.is_text_post = false;
    assert_eq!(f.verdict(&link, 0), Err(Rejection::NotTextPost));

    let mut removed = good();
    removed.body = "[removed]".into();
    assert_eq!(f.verdict(&removed, 0), Err(Rejection::Removed));

    let mut nsfw = good();
    nsfw.is_nsfw = true;
    assert_eq!(f.verdict(&nsfw, 0), Err(Rejection::Nsfw));
}

#[test]
fn spam_wins_over_help_signal() {
    let mut t = good();
    t.body = "Need help? Click here for a guaranteed fix to everything.".into();
    assert_eq!(f_label(&t), "spam");
}

#[test]
fn statements_without_help_signal_are_rejected() {
    let mut t = good();
    t.body = "We shipped our new office chairs today and they are comfy.".into();
    assert_eq!(f_label(&t), "not_help_seeking");
}

fn f_label(t: &Thread) -> &'static str {
    filter().verdict(t, 0).err().map(|r| r.label()).unwrap_or("accepted")
}

#[test]
fn verdict_is_deterministic() {
    let f = filter();
    let samples = [
        good(),
        thread("a", "g", "t", "short", 100, t0()),
        thread("b", "g", "t", "Buy now and make money fast, any advice?", 100, t0()),
        thread("c", "g", "t", "What should we use for payroll in a small team?", -3, t0()),
    ];
    for t in &samples {
        let first = f.verdict(t, 5);
        for _ in 0..10 {
            assert_eq!(f.verdict(t, 5), first);
        }
    }
}
