pub mod scout;

pub use scout::{
    ComposerConfig, DiscoveryConfig, FilterConfig, PostingConfig, ReplyConfig, ReplyStyle,
    ScoringConfig, ScoringWeights, ScoutConfig, DEFAULT_RELEVANCE_THRESHOLD,
    PLATFORM_MIN_POST_INTERVAL_SECS,
};
