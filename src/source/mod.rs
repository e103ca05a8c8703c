// src/source/mod.rs
//! Platform boundary: search for threads and publish replies.
//!
//! `connect` probes live authentication once at startup. Any failure (missing
//! or rejected credentials, network error, timeout) selects the synthetic
//! backend instead of failing, and the chosen `ConnectorMode` is fixed for the
//! life of the process.

pub mod providers;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::error::{Result, ScoutError};
use crate::model::{ConnectorMode, Thread};

pub use providers::live::{Endpoints, LiveConnector};
pub use providers::synthetic::SyntheticConnector;

pub const DEFAULT_USER_AGENT: &str = "thread-scout/0.1 (by opportunity discovery)";

/// One search pass over a single source group.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub group: String,
    pub terms: Vec<String>,
    pub limit: usize,
    /// Connectors may skip threads below this; the quality gate enforces it.
    pub min_popularity_hint: i64,
    /// Threads older than this are not worth returning.
    pub max_age_hint: Duration,
}

/// What the platform handed back for a successful publish.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PublishReceipt {
    pub remote_id: Option<String>,
    pub permalink: Option<String>,
    pub simulated: bool,
}

#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Thread>>;
    async fn publish(&self, thread_id: &str, text: &str) -> Result<PublishReceipt>;
    fn name(&self) -> &'static str;
}

/// Script-app credentials for the password grant.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// `None` unless all four secrets are present and non-empty.
    pub fn from_env() -> Option<Self> {
        let get = |k: &str| {
            std::env::var(k)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Some(Self {
            client_id: get("REDDIT_CLIENT_ID")?,
            client_secret: get("REDDIT_CLIENT_SECRET")?,
            username: get("REDDIT_USERNAME")?,
            password: get("REDDIT_PASSWORD")?,
            user_agent: get("REDDIT_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }
}

/// The connector chosen at startup, tagged with how it was chosen.
#[derive(Clone)]
pub struct Connection {
    mode: ConnectorMode,
    connector: Arc<dyn SourceConnector>,
}

impl Connection {
    pub fn new(mode: ConnectorMode, connector: Arc<dyn SourceConnector>) -> Self {
        Self { mode, connector }
    }

    pub fn mode(&self) -> ConnectorMode {
        self.mode
    }

    pub fn connector(&self) -> Arc<dyn SourceConnector> {
        Arc::clone(&self.connector)
    }

    fn fallback(reason: &ScoutError) -> Self {
        tracing::warn!(target: "source", reason = %reason, "live connection unavailable, using synthetic data");
        Self::new(
            ConnectorMode::Fallback,
            Arc::new(SyntheticConnector::new(Utc::now())),
        )
    }
}

/// Connect against the public platform endpoints. Never fails.
pub async fn connect(credentials: Option<Credentials>, timeout: Duration) -> Connection {
    connect_with(credentials, Endpoints::default(), timeout).await
}

/// Same as `connect` with explicit endpoints.
pub async fn connect_with(
    credentials: Option<Credentials>,
    endpoints: Endpoints,
    timeout: Duration,
) -> Connection {
    let Some(creds) = credentials else {
        return Connection::fallback(&ScoutError::Connection("no credentials configured".into()));
    };

    let attempt = tokio::time::timeout(timeout, LiveConnector::authenticate(creds, endpoints, timeout)).await;
    match attempt {
        Ok(Ok(live)) => {
            tracing::info!(target: "source", "connected to live platform");
            Connection::new(ConnectorMode::Live, Arc::new(live))
        }
        Ok(Err(e)) => Connection::fallback(&e),
        Err(_) => Connection::fallback(&ScoutError::Connection(format!(
            "authentication timed out after {}s",
            timeout.as_secs()
        ))),
    }
}
