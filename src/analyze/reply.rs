//! Review of composed reply text before it is handed to the scheduler.
//!
//! Rejects empty, too short or too long replies, replies with promotional red
//! flags, and replies that talk about being an AI. Pure and deterministic.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ReplyConfig;

static RE_PROMO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(click here|buy now|discount|affiliate|sign up|guaranteed|limited time)\b")
        .expect("promo regex")
});

static RE_SELF_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(as an ai|i am an ai|language model)\b").expect("self-reference regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyIssue {
    Empty,
    TooShort { chars: usize },
    TooLong { chars: usize },
    Promotional { phrase: String },
    SelfReference,
}

impl fmt::Display for ReplyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyIssue::Empty => f.write_str("reply is empty"),
            ReplyIssue::TooShort { chars } => write!(f, "reply too short ({chars} chars)"),
            ReplyIssue::TooLong { chars } => write!(f, "reply too long ({chars} chars)"),
            ReplyIssue::Promotional { phrase } => write!(f, "promotional phrase {phrase:?}"),
            ReplyIssue::SelfReference => f.write_str("reply mentions being an AI"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplyReviewer {
    min_chars: usize,
    max_chars: usize,
}

impl ReplyReviewer {
    pub fn new(cfg: &ReplyConfig) -> Self {
        Self {
            min_chars: cfg.min_chars,
            max_chars: cfg.max_chars,
        }
    }

    pub fn review(&self, reply: &str) -> Result<(), ReplyIssue> {
        let text = reply.trim();
        if text.is_empty() {
            return Err(ReplyIssue::Empty);
        }
        let chars = text.chars().count();
        if chars < self.min_chars {
            return Err(ReplyIssue::TooShort { chars });
        }
        if chars > self.max_chars {
            return Err(ReplyIssue::TooLong { chars });
        }
        if let Some(m) = RE_PROMO.find(text) {
            return Err(ReplyIssue::Promotional {
                phrase: m.as_str().to_lowercase(),
            });
        }
        if RE_SELF_REFERENCE.is_match(text) {
            return Err(ReplyIssue::SelfReference);
        }
        Ok(())
    }
}
