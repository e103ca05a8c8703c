// src/source/providers/live.rs
//! Live platform backend: OAuth password grant, subreddit search, comment
//! submission. Every request carries the caller's timeout.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Result, ScoutError};
use crate::model::Thread;
use crate::source::{Credentials, PublishReceipt, SearchQuery, SourceConnector};

/// Platform search rejects longer queries.
const MAX_QUERY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub auth_url: String,
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            api_base: "https://oauth.reddit.com".to_string(),
        }
    }
}

pub struct LiveConnector {
    client: Client,
    endpoints: Endpoints,
    token: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Deserialize)]
struct Child {
    data: Post,
}

#[derive(Deserialize)]
struct Post {
    id: String,
    subreddit: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    created_utc: f64,
    author: Option<String>,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    over_18: bool,
}

#[derive(Deserialize)]
struct CommentResponse {
    json: CommentJson,
}

#[derive(Deserialize)]
struct CommentJson {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    data: Option<CommentData>,
}

#[derive(Deserialize)]
struct CommentData {
    #[serde(default)]
    things: Vec<CommentThing>,
}

#[derive(Deserialize)]
struct CommentThing {
    data: CommentThingData,
}

#[derive(Deserialize)]
struct CommentThingData {
    id: Option<String>,
    permalink: Option<String>,
}

impl LiveConnector {
    /// Exchange credentials for a bearer token.
    pub async fn authenticate(
        creds: Credentials,
        endpoints: Endpoints,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(creds.user_agent.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| ScoutError::Connection(format!("http client: {e}")))?;

        let rsp = client
            .post(&endpoints.auth_url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", creds.username.as_str()),
                ("password", creds.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ScoutError::Connection(format!("token request: {e}")))?
            .error_for_status()
            .map_err(|e| ScoutError::Connection(format!("token request rejected: {e}")))?;

        let body: TokenResponse = rsp
            .json()
            .await
            .map_err(|e| ScoutError::Connection(format!("token response: {e}")))?;

        match (body.access_token, body.error) {
            (Some(token), None) if !token.is_empty() => Ok(Self {
                client,
                endpoints,
                token,
                timeout,
            }),
            (_, Some(err)) => Err(ScoutError::Connection(format!("authentication rejected: {err}"))),
            _ => Err(ScoutError::Connection("authentication returned no token".into())),
        }
    }
}

#[async_trait]
impl SourceConnector for LiveConnector {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Thread>> {
        let url = format!("{}/r/{}/search", self.endpoints.api_base, query.group);
        let q = build_query(&query.terms);
        let limit = query.limit.clamp(1, 100).to_string();
        let window = time_window(query.max_age_hint);

        let listing: Listing = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .query(&[
                ("q", q.as_str()),
                ("restrict_sr", "1"),
                ("sort", "new"),
                ("t", window),
                ("limit", limit.as_str()),
                ("raw_json", "1"),
            ])
            .send()
            .await
            .map_err(|e| ScoutError::fetch(&query.group, e))?
            .error_for_status()
            .map_err(|e| ScoutError::fetch(&query.group, e))?
            .json()
            .await
            .map_err(|e| ScoutError::fetch(&query.group, format!("decoding listing: {e}")))?;

        let oldest = Utc::now() - chrono::Duration::from_std(query.max_age_hint).unwrap_or_else(|_| chrono::Duration::days(7));
        let threads = listing
            .data
            .children
            .into_iter()
            .map(|c| to_thread(c.data))
            .filter(|t| t.created_at >= oldest)
            .collect::<Vec<_>>();

        tracing::debug!(target: "source", group = %query.group, count = threads.len(), "search done");
        Ok(threads)
    }

    async fn publish(&self, thread_id: &str, text: &str) -> Result<PublishReceipt> {
        let url = format!("{}/api/comment", self.endpoints.api_base);
        let thing_id = format!("t3_{}", thread_id.trim_start_matches("t3_"));

        let rsp: CommentResponse = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .form(&[
                ("api_type", "json"),
                ("thing_id", thing_id.as_str()),
                ("text", text),
            ])
            .send()
            .await
            .map_err(|e| ScoutError::publish(thread_id, e))?
            .error_for_status()
            .map_err(|e| ScoutError::publish(thread_id, e))?
            .json()
            .await
            .map_err(|e| ScoutError::publish(thread_id, format!("decoding response: {e}")))?;

        if !rsp.json.errors.is_empty() {
            let reason = rsp
                .json
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ScoutError::publish(thread_id, reason));
        }

        let thing = rsp
            .json
            .data
            .and_then(|d| d.things.into_iter().next())
            .map(|t| t.data);
        Ok(PublishReceipt {
            remote_id: thing.as_ref().and_then(|t| t.id.clone()),
            permalink: thing.and_then(|t| t.permalink),
            simulated: false,
        })
    }

    fn name(&self) -> &'static str {
        "live"
    }
}

/// OR-join the terms, quoting phrases, without exceeding the query limit.
fn build_query(terms: &[String]) -> String {
    let mut out = String::new();
    for t in terms {
        let t = t.trim();
        if t.is_empty() {
            continue;
        }
        let part = if t.contains(' ') {
            format!("\"{t}\"")
        } else {
            t.to_string()
        };
        let extra = if out.is_empty() { part.len() } else { part.len() + 4 };
        if out.len() + extra > MAX_QUERY_CHARS {
            break;
        }
        if !out.is_empty() {
            out.push_str(" OR ");
        }
        out.push_str(&part);
    }
    out
}

fn time_window(max_age: Duration) -> &'static str {
    match max_age.as_secs() / 86_400 {
        0..=1 => "day",
        2..=7 => "week",
        8..=31 => "month",
        _ => "year",
    }
}

fn to_thread(p: Post) -> Thread {
    let created_at: DateTime<Utc> = Utc
        .timestamp_opt(p.created_utc as i64, 0)
        .single()
        .unwrap_or_else(Utc::now);
    Thread {
        id: p.id,
        group: p.subreddit,
        title: html_escape::decode_html_entities(&p.title).into_owned(),
        body: html_escape::decode_html_entities(&p.selftext).into_owned(),
        popularity: p.score,
        created_at,
        author: p.author.unwrap_or_else(|| "[deleted]".to_string()),
        is_text_post: p.is_self,
        is_nsfw: p.over_18,
    }
}
