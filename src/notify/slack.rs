use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::{CycleSummary, Notifier};

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
}

impl SlackNotifier {
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, summary: &CycleSummary) -> Result<()> {
        let text = format!("*{}*\n{}", summary.title(), summary.body());
        let body = serde_json::json!({ "text": text });

        self.client
            .post(&self.webhook_url)
            .timeout(std::time::Duration::from_secs(5))
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
