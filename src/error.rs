//! Error taxonomy for the discovery and publishing core.
//!
//! Only `Configuration` is fatal. Connection failures switch the connector to
//! fallback mode, fetch failures empty one group's contribution, publish
//! failures become `failed` records.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoutError {
    /// Authentication or network failure while connecting to the platform.
    #[error("connection failed: {0}")]
    Connection(String),

    /// One source-group search failed (or timed out).
    #[error("fetch failed for group `{group}`: {reason}")]
    Fetch { group: String, reason: String },

    /// The platform rejected a reply, or the network failed while sending it.
    #[error("publish failed for thread `{thread_id}`: {reason}")]
    Publish { thread_id: String, reason: String },

    /// Invalid or missing threshold/cap value. Fatal at startup.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Reply text could not be produced.
    #[error("reply composition failed: {0}")]
    Compose(String),

    /// Publish history could not be read or written.
    #[error("history store: {0}")]
    Storage(String),
}

impl ScoutError {
    pub fn fetch(group: impl Into<String>, reason: impl ToString) -> Self {
        ScoutError::Fetch {
            group: group.into(),
            reason: reason.to_string(),
        }
    }

    pub fn publish(thread_id: impl Into<String>, reason: impl ToString) -> Self {
        ScoutError::Publish {
            thread_id: thread_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ScoutError::Configuration(msg.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ScoutError::Configuration(_))
    }

    /// Short reason without the variant prefix, for records and reports.
    pub fn reason(&self) -> String {
        match self {
            ScoutError::Fetch { reason, .. } | ScoutError::Publish { reason, .. } => reason.clone(),
            ScoutError::Connection(m)
            | ScoutError::Configuration(m)
            | ScoutError::Compose(m)
            | ScoutError::Storage(m) => m.clone(),
        }
    }
}

impl From<std::io::Error> for ScoutError {
    fn from(e: std::io::Error) -> Self {
        ScoutError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ScoutError {
    fn from(e: serde_json::Error) -> Self {
        ScoutError::Storage(e.to_string())
    }
}

pub type Result<T, E = ScoutError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configuration_is_fatal() {
        assert!(ScoutError::config("daily_cap missing").is_fatal());
        assert!(!ScoutError::fetch("rust", "timeout").is_fatal());
        assert!(!ScoutError::publish("abc", "403").is_fatal());
        assert!(!ScoutError::Connection("bad creds".into()).is_fatal());
    }

    #[test]
    fn reason_strips_context() {
        let e = ScoutError::publish("t1", "RATELIMIT");
        assert_eq!(e.reason(), "RATELIMIT");
        assert_eq!(e.to_string(), "publish failed for thread `t1`: RATELIMIT");
    }
}
