//! Reply composition.
//!
//! The pipeline only calls a composer for ranked candidates. Two providers:
//! `OpenAiComposer` (chat completions) and `TemplateComposer` (offline,
//! deterministic). `build_composer` picks one from config.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{ComposerConfig, ReplyStyle};
use crate::context::BusinessContext;
use crate::error::{Result, ScoutError};
use crate::model::Thread;

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Thread text beyond this is cut before it goes into a prompt.
const PROMPT_BODY_CHARS: usize = 1200;

#[async_trait]
pub trait ResponseComposer: Send + Sync {
    async fn compose(
        &self,
        thread: &Thread,
        context: &BusinessContext,
        style: ReplyStyle,
    ) -> Result<String>;

    fn name(&self) -> &'static str;
}

pub type DynComposer = Arc<dyn ResponseComposer>;

/// Choose a composer: OpenAI when configured with a usable key, otherwise
/// the template composer.
pub fn build_composer(cfg: &ComposerConfig, timeout: Duration) -> DynComposer {
    let provider = cfg.provider.trim().to_ascii_lowercase();
    if provider == "template" {
        return Arc::new(TemplateComposer);
    }
    match cfg.resolved_api_key() {
        Some(key) if provider == "openai" => {
            Arc::new(OpenAiComposer::new(key, cfg.model.clone(), timeout))
        }
        _ => {
            tracing::info!(target: "compose", provider = %cfg.provider, "no usable API key, using template replies");
            Arc::new(TemplateComposer)
        }
    }
}

// ------------------------------------------------------------
// OpenAI
// ------------------------------------------------------------

pub struct OpenAiComposer {
    http: Client,
    api_key: String,
    model: String,
    url: String,
    timeout: Duration,
}

impl OpenAiComposer {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model,
            url: OPENAI_CHAT_URL.to_string(),
            timeout,
        }
    }

    /// Point at a different chat-completions endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: String,
}

const SYSTEM_PROMPT: &str = "You are a regular member of an online community helping someone with their question. \
Write one to three short sentences. Be genuinely useful first. Mention the product only if it clearly fits, \
and never sound like an advertisement. Never say you are an AI. Output only the reply.";

pub(crate) fn build_prompt(thread: &Thread, context: &BusinessContext, style: ReplyStyle) -> String {
    let body: String = thread.body.chars().take(PROMPT_BODY_CHARS).collect();
    let product = if context.product_summary.trim().is_empty() {
        "a tool"
    } else {
        context.product_summary.trim()
    };
    format!(
        "QUESTION (r/{group}): {title}\n{body}\n\n\
         CONTEXT: you know about {product}, which {benefit}. Only mention it if it helps with this exact situation.\n\
         STYLE: {guide}",
        group = thread.group,
        title = thread.title,
        benefit = context.main_benefit(),
        guide = style.guide(),
    )
}

#[async_trait]
impl ResponseComposer for OpenAiComposer {
    async fn compose(
        &self,
        thread: &Thread,
        context: &BusinessContext,
        style: ReplyStyle,
    ) -> Result<String> {
        let prompt = build_prompt(thread, context, style);
        let req = ChatReq {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.7,
            max_tokens: 220,
        };

        let resp: ChatResp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&req)
            .send()
            .await
            .map_err(|e| ScoutError::Compose(format!("request: {e}")))?
            .error_for_status()
            .map_err(|e| ScoutError::Compose(format!("status: {e}")))?
            .json()
            .await
            .map_err(|e| ScoutError::Compose(format!("decoding: {e}")))?;

        let raw = resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ScoutError::Compose("no choices returned".into()))?;
        let reply = polish_reply(&raw);
        if reply.is_empty() {
            return Err(ScoutError::Compose("empty reply".into()));
        }
        Ok(reply)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Template
// ------------------------------------------------------------

/// Offline composer. The same thread, context and style always give the same
/// reply; the variant is picked from a hash of the thread id.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateComposer;

const CASUAL: &[&str] = &[
    "Been there with \"{title}\". What worked for me was {product}, it {benefit}. Might be worth a look.",
    "Oh man, \"{title}\" hits close to home. I ended up trying {product} and it {benefit}.",
    "Honestly, for \"{title}\" I'd keep it simple. {product} {benefit}, which was enough for us.",
];

const PROFESSIONAL: &[&str] = &[
    "For \"{title}\", start by writing down the one process that hurts most. {product} {benefit}, which is why it worked well in a similar setup.",
    "A pattern I've seen with \"{title}\": the tooling matters less than a single source of truth. {product} {benefit}.",
    "Re \"{title}\": evaluate two or three options against your actual workflow. {product} is one to include, since it {benefit}.",
];

const HELPFUL: &[&str] = &[
    "For \"{title}\": list what you do every week, automate the most repetitive item first, then review after a month. {product} {benefit} if you want a tool for that.",
    "A few steps that help with \"{title}\": pick one owner per task, keep deadlines visible, and check in weekly. {product} {benefit}.",
    "On \"{title}\": try a two-week trial of a lightweight system before committing. We used {product}; it {benefit}.",
];

fn variant(thread_id: &str, n: usize) -> usize {
    let d = Sha256::digest(thread_id.as_bytes());
    (d[0] as usize) % n
}

#[async_trait]
impl ResponseComposer for TemplateComposer {
    async fn compose(
        &self,
        thread: &Thread,
        context: &BusinessContext,
        style: ReplyStyle,
    ) -> Result<String> {
        let set = match style {
            ReplyStyle::Casual => CASUAL,
            ReplyStyle::Professional => PROFESSIONAL,
            ReplyStyle::Helpful => HELPFUL,
        };
        let product = match context.product_summary.trim() {
            "" => "a lightweight tool",
            p => p,
        };
        let title = thread.title.trim().trim_end_matches(['?', '.', '!']);
        let tpl = set[variant(&thread.id, set.len())];
        let reply = tpl
            .replace("{title}", title)
            .replace("{product}", product)
            .replace("{benefit}", context.main_benefit());
        Ok(polish_reply(&reply))
    }

    fn name(&self) -> &'static str {
        "template"
    }
}

// ------------------------------------------------------------
// Post-processing
// ------------------------------------------------------------

static RE_SELF_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(as an ai( language model)?|i am an ai( language model)?|as a language model)\b[,:]?\s*")
        .expect("self-reference regex")
});
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n(\s*\n)+").expect("blank-lines regex"));
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("spaces regex"));

/// Strip AI self-references and wrapping quotes, collapse runs of blank lines.
pub fn polish_reply(raw: &str) -> String {
    let s = RE_SELF_REF.replace_all(raw, "");
    let s = RE_BLANK_LINES.replace_all(&s, "\n\n");
    let s = RE_SPACES.replace_all(&s, " ");
    let s = s.trim();
    let s = s
        .strip_prefix('"')
        .and_then(|x| x.strip_suffix('"'))
        .unwrap_or(s);
    let mut out = s.trim().to_string();
    if let Some(first) = out.chars().next() {
        if first.is_lowercase() {
            let upper: String = first.to_uppercase().collect();
            out.replace_range(..first.len_utf8(), &upper);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn thread(id: &str, title: &str) -> Thread {
        Thread {
            id: id.into(),
            group: "smallbusiness".into(),
            title: title.into(),
            body: "We keep missing deadlines, any advice?".into(),
            popularity: 10,
            created_at: Utc::now(),
            author: "a".into(),
            is_text_post: true,
            is_nsfw: false,
        }
    }

    fn ctx() -> BusinessContext {
        BusinessContext {
            product_summary: "TaskPilot".into(),
            key_benefits: vec!["keeps every task and deadline in one place".into()],
            ..Default::default()
        }
    }

    #[test]
    fn polish_strips_self_references_and_blank_runs() {
        let raw = "\"as an AI language model, I think a board helps.\n\n\n\nTry it.\"";
        assert_eq!(polish_reply(raw), "I think a board helps.\n\nTry it.");
    }

    #[tokio::test]
    async fn template_is_deterministic_and_mentions_product() {
        let t = thread("mock1", "Looking for a tracker?");
        let a = TemplateComposer.compose(&t, &ctx(), ReplyStyle::Casual).await.unwrap();
        let b = TemplateComposer.compose(&t, &ctx(), ReplyStyle::Casual).await.unwrap();
        assert_eq!(a, b);
        assert!(a.contains("TaskPilot"));
        assert!(a.contains("Looking for a tracker"));
        assert!(!a.contains('{'));
    }

    #[test]
    fn prompt_carries_style_and_context() {
        let p = build_prompt(&thread("x", "Need a CRM"), &ctx(), ReplyStyle::Professional);
        assert!(p.contains("r/smallbusiness"));
        assert!(p.contains("TaskPilot"));
        assert!(p.contains(ReplyStyle::Professional.guide()));
    }

    #[test]
    fn template_provider_needs_no_key() {
        let cfg = ComposerConfig {
            provider: "template".into(),
            ..ComposerConfig::default()
        };
        assert_eq!(build_composer(&cfg, Duration::from_secs(5)).name(), "template");
    }
}
