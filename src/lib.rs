// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cancel;
pub mod clock;
pub mod compose;
pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod scheduler;
pub mod source;
pub mod stats;
pub mod terms;

// Filtering, scoring, ranking and reply review
pub mod analyze;

// Operator notifications
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::cancel::CancelSignal;
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::ScoutConfig;
pub use crate::context::BusinessContext;
pub use crate::error::{Result, ScoutError};
pub use crate::model::{Candidate, ConnectorMode, PublishOutcome, PublishRecord, ScoredBatch, Thread};
pub use crate::notify::{CycleSummary, NotifierMux};
pub use crate::pipeline::{CycleReport, Pipeline};
pub use crate::scheduler::{BatchReport, PostingScheduler, PostingState, PostingStatus, Submission};
