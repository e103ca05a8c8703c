// src/config/scout.rs
//! Pipeline configuration: one TOML file, one section per component.
//!
//! ```toml
//! data_dir = "data"
//!
//! [filter]
//! min_popularity = 5
//!
//! [scoring]
//! threshold = 0.5
//! keywords = ["task tracking", "automation"]
//!
//! [posting]
//! dry_run = true
//! daily_cap = 10
//! min_post_interval_secs = 600
//! ```
//!
//! Lookup order: `$SCOUT_CONFIG_PATH`, then `config/scout.toml`. A missing file
//! means defaults; an unreadable or unparsable one is a configuration error.
//! Selected env vars override the file (see `apply_env_overrides`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};

pub const DEFAULT_CONFIG_PATH: &str = "config/scout.toml";
pub const ENV_CONFIG_PATH: &str = "SCOUT_CONFIG_PATH";

pub const ENV_DRY_RUN: &str = "SCOUT_DRY_RUN";
pub const ENV_DAILY_CAP: &str = "SCOUT_DAILY_CAP";
pub const ENV_MIN_POST_INTERVAL: &str = "SCOUT_MIN_POST_INTERVAL_SECS";
pub const ENV_RELEVANCE_THRESHOLD: &str = "SCOUT_RELEVANCE_THRESHOLD";

/// Platform-mandated floor between two replies.
pub const PLATFORM_MIN_POST_INTERVAL_SECS: u64 = 600;

/// Upper bounds for duration settings; anything longer is a typo.
pub const MAX_POST_INTERVAL_SECS: u64 = 365 * 24 * 3600;
pub const MAX_RECENCY_HORIZON_HOURS: u64 = 365 * 24;

/// Relevance cutoff for ranking. Empirically tuned, not derived.
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.5;

pub const DEFAULT_SPAM_PHRASES: &[&str] = &[
    "buy now",
    "click here",
    "limited time",
    "act fast",
    "guaranteed",
    "make money fast",
    "work from home",
    "get rich",
    "free money",
];

pub const DEFAULT_HELP_PHRASES: &[&str] = &[
    "?",
    "help",
    "advice",
    "recommend",
    "suggest",
    "looking for",
    "need",
    "how to",
    "best way",
    "what should",
    "any ideas",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoutConfig {
    pub data_dir: PathBuf,
    pub filter: FilterConfig,
    pub scoring: ScoringConfig,
    pub discovery: DiscoveryConfig,
    pub posting: PostingConfig,
    pub reply: ReplyConfig,
    pub composer: ComposerConfig,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            filter: FilterConfig::default(),
            scoring: ScoringConfig::default(),
            discovery: DiscoveryConfig::default(),
            posting: PostingConfig::default(),
            reply: ReplyConfig::default(),
            composer: ComposerConfig::default(),
        }
    }
}

/// Quality gate applied to every fetched thread before scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    pub min_popularity: i64,
    pub body_min_chars: usize,
    pub body_max_chars: usize,
    pub allow_nsfw: bool,
    pub spam_phrases: Vec<String>,
    pub help_phrases: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_popularity: 5,
            body_min_chars: 20,
            body_max_chars: 2000,
            allow_nsfw: false,
            spam_phrases: strings(DEFAULT_SPAM_PHRASES),
            help_phrases: strings(DEFAULT_HELP_PHRASES),
        }
    }
}

/// Relevance scoring weights. Every increment is non-negative so more signal
/// never lowers a score; penalties only apply to negative indicators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub high_intent: f32,
    pub problem_statement: f32,
    pub keyword: f32,
    pub keyword_in_context: f32,
    pub pain_point_word: f32,
    pub question_title: f32,
    pub recency_max: f32,
    pub engagement_per_point: f32,
    pub engagement_cap: f32,
    pub negative_penalty: f32,
    pub promotional_penalty: f32,
    pub max_score: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            high_intent: 0.8,
            problem_statement: 0.6,
            keyword: 0.1,
            keyword_in_context: 0.2,
            pain_point_word: 0.05,
            question_title: 0.05,
            recency_max: 0.1,
            engagement_per_point: 0.002,
            engagement_cap: 0.1,
            negative_penalty: 0.5,
            promotional_penalty: 0.8,
            max_score: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Candidates scoring below this are dropped by the ranker.
    pub threshold: f32,
    /// Target keywords, merged with the business context's own keywords.
    pub keywords: Vec<String>,
    /// Recency bonus fades to zero at this age.
    pub recency_horizon_hours: u64,
    pub weights: ScoringWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RELEVANCE_THRESHOLD,
            keywords: Vec::new(),
            recency_horizon_hours: 7 * 24,
            weights: ScoringWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Width of the fetch worker pool.
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Per-group search limit passed to the connector.
    pub search_limit: usize,
    pub max_age_days: u32,
    /// How many source groups a cycle searches.
    pub group_limit: usize,
    /// How many ranked candidates a cycle composes replies for.
    pub max_candidates: usize,
    pub cycle_interval_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 3,
            fetch_timeout_secs: 30,
            connect_timeout_secs: 15,
            search_limit: 25,
            max_age_days: 7,
            group_limit: 8,
            max_candidates: 20,
            cycle_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostingConfig {
    pub dry_run: bool,
    pub daily_cap: u32,
    pub min_post_interval_secs: u64,
    /// Inside a batch, wait for the rate-limit window instead of skipping.
    pub pace_batch: bool,
    pub publish_timeout_secs: u64,
    /// Replies this similar to a recent one count as duplicates.
    pub reply_similarity_threshold: f32,
    /// Number of recent replies the similarity check looks at.
    pub reply_window: usize,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            daily_cap: 10,
            min_post_interval_secs: PLATFORM_MIN_POST_INTERVAL_SECS,
            pace_batch: true,
            publish_timeout_secs: 30,
            reply_similarity_threshold: 0.9,
            reply_window: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStyle {
    #[default]
    Casual,
    Professional,
    Helpful,
}

impl ReplyStyle {
    pub fn guide(self) -> &'static str {
        match self {
            ReplyStyle::Casual => {
                "Write like a regular community member texting a friend: short, relaxed, contractions, no corporate speak."
            }
            ReplyStyle::Professional => {
                "Write as an experienced practitioner: clear, courteous, concrete, no hype."
            }
            ReplyStyle::Helpful => {
                "Lead with practical steps that solve the problem; mention a tool only where it genuinely fits."
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplyConfig {
    pub style: ReplyStyle,
    pub min_chars: usize,
    pub max_chars: usize,
    pub compose_timeout_secs: u64,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            style: ReplyStyle::Casual,
            min_chars: 20,
            max_chars: 1000,
            compose_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComposerConfig {
    /// "openai" | "template" (case-insensitive)
    pub provider: String,
    /// "ENV" means: read from OPENAI_API_KEY
    pub api_key: String,
    pub model: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: "ENV".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl ComposerConfig {
    /// Resolve the API key. `None` means no usable key (template composer).
    pub fn resolved_api_key(&self) -> Option<String> {
        let key = if self.api_key.trim().eq_ignore_ascii_case("env") {
            std::env::var("OPENAI_API_KEY").ok()?
        } else {
            self.api_key.clone()
        };
        let key = key.trim().to_string();
        (!key.is_empty()).then_some(key)
    }
}

impl ScoutConfig {
    /// Load using `$SCOUT_CONFIG_PATH` or `config/scout.toml`, apply env
    /// overrides, then validate.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ScoutError::config(format!("reading config at {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: ScoutConfig =
            toml::from_str(s).map_err(|e| ScoutError::config(format!("parsing config: {e}")))?;
        cfg.normalize();
        Ok(cfg)
    }

    /// Env overrides. A present but unparsable value is an error, never ignored.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<bool>(ENV_DRY_RUN)? {
            self.posting.dry_run = v;
        }
        if let Some(v) = env_parse::<u32>(ENV_DAILY_CAP)? {
            self.posting.daily_cap = v;
        }
        if let Some(v) = env_parse::<u64>(ENV_MIN_POST_INTERVAL)? {
            self.posting.min_post_interval_secs = v;
        }
        if let Some(v) = env_parse::<f32>(ENV_RELEVANCE_THRESHOLD)? {
            self.scoring.threshold = v;
        }
        Ok(())
    }

    /// Reject values that would weaken the safety limits or break invariants.
    pub fn validate(&self) -> Result<()> {
        let t = self.scoring.threshold;
        if !t.is_finite() || t < 0.0 {
            return Err(ScoutError::config(format!(
                "scoring.threshold must be a finite non-negative number (got {t})"
            )));
        }
        if self.posting.min_post_interval_secs < PLATFORM_MIN_POST_INTERVAL_SECS {
            return Err(ScoutError::config(format!(
                "posting.min_post_interval_secs must be at least {PLATFORM_MIN_POST_INTERVAL_SECS} (got {})",
                self.posting.min_post_interval_secs
            )));
        }
        if self.posting.min_post_interval_secs > MAX_POST_INTERVAL_SECS {
            return Err(ScoutError::config(format!(
                "posting.min_post_interval_secs must be at most {MAX_POST_INTERVAL_SECS} (got {})",
                self.posting.min_post_interval_secs
            )));
        }
        if self.scoring.recency_horizon_hours > MAX_RECENCY_HORIZON_HOURS {
            return Err(ScoutError::config(format!(
                "scoring.recency_horizon_hours must be at most {MAX_RECENCY_HORIZON_HOURS} (got {})",
                self.scoring.recency_horizon_hours
            )));
        }
        if self.filter.body_min_chars > self.filter.body_max_chars {
            return Err(ScoutError::config(format!(
                "filter.body_min_chars ({}) exceeds filter.body_max_chars ({})",
                self.filter.body_min_chars, self.filter.body_max_chars
            )));
        }
        if self.reply.min_chars > self.reply.max_chars {
            return Err(ScoutError::config(
                "reply.min_chars exceeds reply.max_chars",
            ));
        }
        let s = self.posting.reply_similarity_threshold;
        if !(0.0..=1.0).contains(&s) {
            return Err(ScoutError::config(format!(
                "posting.reply_similarity_threshold must be within [0, 1] (got {s})"
            )));
        }
        if self.discovery.fetch_concurrency == 0 {
            return Err(ScoutError::config("discovery.fetch_concurrency must be > 0"));
        }
        for (name, v) in [
            ("discovery.fetch_timeout_secs", self.discovery.fetch_timeout_secs),
            ("discovery.connect_timeout_secs", self.discovery.connect_timeout_secs),
            ("posting.publish_timeout_secs", self.posting.publish_timeout_secs),
            ("reply.compose_timeout_secs", self.reply.compose_timeout_secs),
        ] {
            if v == 0 {
                return Err(ScoutError::config(format!("{name} must be > 0")));
            }
        }
        let w = &self.scoring.weights;
        let increments = [
            w.high_intent,
            w.problem_statement,
            w.keyword,
            w.keyword_in_context,
            w.pain_point_word,
            w.question_title,
            w.recency_max,
            w.engagement_per_point,
            w.engagement_cap,
            w.negative_penalty,
            w.promotional_penalty,
            w.max_score,
        ];
        if increments.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return Err(ScoutError::config(
                "scoring.weights must be finite and non-negative",
            ));
        }
        if w.keyword_in_context < w.keyword {
            return Err(ScoutError::config(
                "scoring.weights.keyword_in_context must be >= scoring.weights.keyword",
            ));
        }
        Ok(())
    }

    /// Trim, lowercase and dedup phrase lists.
    fn normalize(&mut self) {
        self.filter.spam_phrases = clean_list(std::mem::take(&mut self.filter.spam_phrases));
        self.filter.help_phrases = clean_list(std::mem::take(&mut self.filter.help_phrases));
        self.scoring.keywords = clean_list(std::mem::take(&mut self.scoring.keywords));
        self.composer.provider = self.composer.provider.to_lowercase();
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ScoutError::config(format!("{name}={raw:?} is not a valid value"))),
        Err(_) => Ok(None),
    }
}

pub(crate) fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}
