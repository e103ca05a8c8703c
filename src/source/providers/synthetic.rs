// src/source/providers/synthetic.rs
//! Deterministic offline backend used in fallback mode.
//!
//! The dataset is fixed: seven threads shaped like real help requests, spread
//! over four groups, with timestamps anchored at construction time. It
//! includes one link post, one low-popularity thread and one rant so every
//! downstream rejection path runs in a demo. Publishing never leaves the
//! process.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::model::Thread;
use crate::source::{PublishReceipt, SearchQuery, SourceConnector};

pub struct SyntheticConnector {
    threads: Vec<Thread>,
    published: AtomicU64,
}

struct Seed {
    id: &'static str,
    group: &'static str,
    title: &'static str,
    body: &'static str,
    popularity: i64,
    age_hours: i64,
    author: &'static str,
    is_text_post: bool,
}

const SEEDS: &[Seed] = &[
    Seed {
        id: "mock1",
        group: "entrepreneur",
        title: "Looking for a good project management tool for small team",
        body: "Hey everyone! I run a small startup with 5 people and we keep losing track of tasks and deadlines. We've tried spreadsheets but it gets messy. Looking for something simple and affordable. Any recommendations?",
        popularity: 25,
        age_hours: 3,
        author: "startup_founder",
        is_text_post: true,
    },
    Seed {
        id: "mock2",
        group: "smallbusiness",
        title: "Best tools for automating repetitive business tasks?",
        body: "I'm struggling with data entry, scheduling, and follow-ups. It's killing my productivity. Does anyone know of good automation tools? I'm not super technical but willing to learn.",
        popularity: 45,
        age_hours: 5,
        author: "busy_entrepreneur",
        is_text_post: true,
    },
    Seed {
        id: "mock3",
        group: "productivity",
        title: "Struggling with team communication and task tracking",
        body: "Our team is growing and we're having trouble staying organized. People miss deadlines, forget tasks, and messages are scattered across email, chat and texts. Need a better system.",
        popularity: 18,
        age_hours: 26,
        author: "team_leader",
        is_text_post: true,
    },
    Seed {
        id: "mock4",
        group: "startups",
        title: "What should I use for client onboarding?",
        body: "We onboard about ten new clients a month and everything lives in email threads. Any advice on tools that keep checklists and documents in one place?",
        popularity: 12,
        age_hours: 8,
        author: "ops_generalist",
        is_text_post: true,
    },
    Seed {
        id: "mock5",
        group: "smallbusiness",
        title: "Anyone else hate invoicing?",
        body: "Just venting a bit. Chasing late payments eats my Fridays every single week. How do you all deal with it?",
        popularity: 30,
        age_hours: 2,
        author: "tired_freelancer",
        is_text_post: true,
    },
    Seed {
        id: "mock6",
        group: "smallbusiness",
        title: "Check out our new storefront",
        body: "",
        popularity: 7,
        age_hours: 1,
        author: "shop_owner",
        is_text_post: false,
    },
    Seed {
        id: "mock7",
        group: "productivity",
        title: "Looking for a habit tracker recommendation",
        body: "Any recommendations for a simple habit tracker app? Paper journals never stick for me.",
        popularity: 2,
        age_hours: 12,
        author: "new_year_new_me",
        is_text_post: true,
    },
];

impl SyntheticConnector {
    pub fn new(anchor: DateTime<Utc>) -> Self {
        Self {
            threads: dataset(anchor),
            published: AtomicU64::new(0),
        }
    }

    /// Simulated publishes so far.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

/// The full synthetic dataset with timestamps relative to `anchor`.
pub fn dataset(anchor: DateTime<Utc>) -> Vec<Thread> {
    SEEDS
        .iter()
        .map(|s| Thread {
            id: s.id.to_string(),
            group: s.group.to_string(),
            title: s.title.to_string(),
            body: s.body.to_string(),
            popularity: s.popularity,
            created_at: anchor - Duration::hours(s.age_hours),
            author: s.author.to_string(),
            is_text_post: s.is_text_post,
            is_nsfw: false,
        })
        .collect()
}

#[async_trait]
impl SourceConnector for SyntheticConnector {
    /// Threads from the requested group, or the whole dataset when the group
    /// has none, so any plan gets something to work on.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Thread>> {
        let in_group: Vec<Thread> = self
            .threads
            .iter()
            .filter(|t| t.group.eq_ignore_ascii_case(&query.group))
            .cloned()
            .collect();
        let mut out = if in_group.is_empty() {
            self.threads.clone()
        } else {
            in_group
        };
        out.truncate(query.limit);
        Ok(out)
    }

    async fn publish(&self, thread_id: &str, _text: &str) -> Result<PublishReceipt> {
        self.published.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "source", thread_id, "simulated publish");
        Ok(PublishReceipt {
            remote_id: None,
            permalink: None,
            simulated: true,
        })
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}
