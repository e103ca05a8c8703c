//! Business context a discovery cycle is run for.
//!
//! Loaded from `config/business.toml` (or `$SCOUT_BUSINESS_PATH`); producing it
//! from a free-form description is outside this crate.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::scout::clean_list;
use crate::error::{Result, ScoutError};

pub const DEFAULT_BUSINESS_PATH: &str = "config/business.toml";
pub const ENV_BUSINESS_PATH: &str = "SCOUT_BUSINESS_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BusinessContext {
    pub product_summary: String,
    /// Free-form industry label, e.g. "B2B SaaS productivity".
    pub industry: String,
    pub keywords: Vec<String>,
    pub pain_points: Vec<String>,
    /// Groups to search first, before industry defaults.
    pub recommended_groups: Vec<String>,
    pub key_benefits: Vec<String>,
}

impl BusinessContext {
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(ENV_BUSINESS_PATH)
            .unwrap_or_else(|_| DEFAULT_BUSINESS_PATH.to_string());
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).map_err(|e| {
            ScoutError::config(format!("reading business context at {}: {e}", path.display()))
        })?;
        let mut ctx: BusinessContext = toml::from_str(&s)
            .map_err(|e| ScoutError::config(format!("parsing business context: {e}")))?;
        ctx.keywords = clean_list(ctx.keywords);
        Ok(ctx)
    }

    /// Short, stable hex fingerprint; changes whenever any field changes.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        // serde_json keeps field order stable for a struct.
        hasher.update(serde_json::to_vec(self).unwrap_or_default());
        short_hex(&hasher.finalize())
    }

    /// The benefit to lead with in a reply, if any.
    pub fn main_benefit(&self) -> &str {
        self.key_benefits
            .first()
            .map(String::as_str)
            .unwrap_or("helps with exactly this kind of problem")
    }
}

/// 12-char hex prefix of a digest; used for fingerprints and anonymized log ids.
pub(crate) fn short_hex(digest: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Anonymized id for text that must not appear in logs.
pub(crate) fn text_id(text: &str) -> String {
    short_hex(&Sha256::digest(text.as_bytes()))
}
