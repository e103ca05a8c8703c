//! Quality gate for fetched threads.
//!
//! A thread is rejected when any of these holds:
//! - popularity below the minimum,
//! - not a text post (or NSFW, unless allowed),
//! - body deleted/removed, shorter than the minimum or longer than the maximum,
//! - body contains a spam phrase,
//! - body contains no help-seeking signal.
//!
//! Pure: the verdict depends only on the thread, the minimum popularity and the
//! phrase lists fixed at construction.

use std::fmt;

use crate::config::FilterConfig;
use crate::model::Thread;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    LowPopularity { popularity: i64, min: i64 },
    NotTextPost,
    Nsfw,
    Removed,
    TooShort { chars: usize },
    TooLong { chars: usize },
    Spam { phrase: String },
    NotHelpSeeking,
}

impl Rejection {
    /// Stable label for stats and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::LowPopularity { .. } => "low_popularity",
            Rejection::NotTextPost => "not_text_post",
            Rejection::Nsfw => "nsfw",
            Rejection::Removed => "removed",
            Rejection::TooShort { .. } => "too_short",
            Rejection::TooLong { .. } => "too_long",
            Rejection::Spam { .. } => "spam",
            Rejection::NotHelpSeeking => "not_help_seeking",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::LowPopularity { popularity, min } => {
                write!(f, "popularity {popularity} below minimum {min}")
            }
            Rejection::NotTextPost => f.write_str("not a text post"),
            Rejection::Nsfw => f.write_str("nsfw content"),
            Rejection::Removed => f.write_str("body deleted or removed"),
            Rejection::TooShort { chars } => write!(f, "body too short ({chars} chars)"),
            Rejection::TooLong { chars } => write!(f, "body too long ({chars} chars)"),
            Rejection::Spam { phrase } => write!(f, "spam phrase {phrase:?}"),
            Rejection::NotHelpSeeking => f.write_str("no help-seeking signal"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QualityFilter {
    body_min_chars: usize,
    body_max_chars: usize,
    allow_nsfw: bool,
    spam_phrases: Vec<String>,
    help_phrases: Vec<String>,
}

impl QualityFilter {
    pub fn new(cfg: &FilterConfig) -> Self {
        let lower = |v: &[String]| v.iter().map(|p| p.to_lowercase()).collect::<Vec<_>>();
        Self {
            body_min_chars: cfg.body_min_chars,
            body_max_chars: cfg.body_max_chars,
            allow_nsfw: cfg.allow_nsfw,
            spam_phrases: lower(&cfg.spam_phrases),
            help_phrases: lower(&cfg.help_phrases),
        }
    }

    pub fn accept(&self, thread: &Thread, min_popularity: i64) -> bool {
        self.verdict(thread, min_popularity).is_ok()
    }

    /// Like `accept`, but says why a thread was turned away.
    pub fn verdict(&self, thread: &Thread, min_popularity: i64) -> Result<(), Rejection> {
        if thread.popularity < min_popularity {
            return Err(Rejection::LowPopularity {
                popularity: thread.popularity,
                min: min_popularity,
            });
        }
        if !thread.is_text_post {
            return Err(Rejection::NotTextPost);
        }
        if thread.is_nsfw && !self.allow_nsfw {
            return Err(Rejection::Nsfw);
        }

        let body = thread.body.as_str();
        if matches!(body.trim(), "[deleted]" | "[removed]") {
            return Err(Rejection::Removed);
        }
        // Length bounds apply to the body as posted, whitespace included.
        let chars = body.chars().count();
        if chars < self.body_min_chars {
            return Err(Rejection::TooShort { chars });
        }
        if chars > self.body_max_chars {
            return Err(Rejection::TooLong { chars });
        }

        let lower = body.to_lowercase();
        if let Some(p) = self.spam_phrases.iter().find(|p| lower.contains(p.as_str())) {
            return Err(Rejection::Spam { phrase: p.clone() });
        }
        if !self.help_phrases.iter().any(|p| lower.contains(p.as_str())) {
            return Err(Rejection::NotHelpSeeking);
        }
        Ok(())
    }
}
