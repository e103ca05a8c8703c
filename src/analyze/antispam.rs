//! Near-duplicate reply guard.
//!
//! Keeps a sliding window of recently published reply texts and flags a new
//! reply whose normalized Levenshtein similarity to any of them reaches the
//! threshold. Used by the posting scheduler as part of its duplicate check.
//!
//! - `is_near_duplicate(text)` only reads the window.
//! - `remember(text)` is called after a reply is committed.

use std::collections::VecDeque;

/// Configuration for the reply guard.
#[derive(Clone, Debug)]
pub struct AntiSpamParams {
    /// Max number of remembered replies.
    pub window_size: usize,
    /// Similarity in [0.0, 1.0]. Replies >= this threshold are near-duplicates.
    pub similarity_threshold: f32,
}

impl Default for AntiSpamParams {
    fn default() -> Self {
        Self {
            window_size: 20,
            similarity_threshold: 0.90,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AntiSpam {
    params: AntiSpamParams,
    window: VecDeque<String>,
}

impl AntiSpam {
    pub fn new(mut params: AntiSpamParams) -> Self {
        params.similarity_threshold = params.similarity_threshold.clamp(0.0, 1.0);
        let ws = params.window_size;
        Self {
            params,
            window: VecDeque::with_capacity(ws),
        }
    }

    /// Seed from already published replies, oldest first.
    pub fn with_history<I, S>(params: AntiSpamParams, published: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut guard = Self::new(params);
        for text in published {
            guard.remember(text.as_ref());
        }
        guard
    }

    pub fn params(&self) -> &AntiSpamParams {
        &self.params
    }

    pub fn is_near_duplicate(&self, text: &str) -> bool {
        if self.params.window_size == 0 {
            return false;
        }
        let norm = normalize(text);
        if norm.is_empty() {
            return false;
        }
        self.window.iter().rev().any(|seen| {
            strsim::normalized_levenshtein(&norm, seen) as f32 >= self.params.similarity_threshold
        })
    }

    pub fn remember(&mut self, text: &str) {
        if self.params.window_size == 0 {
            return;
        }
        if self.window.len() == self.params.window_size {
            self.window.pop_front();
        }
        self.window.push_back(normalize(text));
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

/// Lowercase and collapse whitespace before comparing.
fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        }
    }
    out.trim().to_string()
}
