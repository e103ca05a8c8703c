// src/analyze/mod.rs
//! Pure analysis stages: quality gate, relevance scoring, ranking, reply review
//! and the near-duplicate reply guard. Nothing here does I/O, so every stage is
//! safe to call from any number of fetch workers.

pub mod antispam;
pub mod quality;
pub mod rank;
pub mod relevance;
pub mod reply;

pub use crate::analyze::antispam::{AntiSpam, AntiSpamParams};
pub use crate::analyze::quality::{QualityFilter, Rejection};
pub use crate::analyze::rank::{rank, rank_with_stats, RankStats};
pub use crate::analyze::relevance::{KeywordSet, RelevanceScorer, ScoreBreakdown};
pub use crate::analyze::reply::{ReplyIssue, ReplyReviewer};
