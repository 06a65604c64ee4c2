// src/notify/slack.rs
use anyhow::{Context, Result};
use reqwest::Client;

use super::{NotificationEvent, Notifier};

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

    pub fn from_env() -> Option<Self> {
        Self::from_env_prefixed("")
    }

    pub fn from_env_prefixed(prefix: &str) -> Option<Self> {
        std::env::var(format!("{prefix}SLACK_WEBHOOK_URL"))
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(Self::new)
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let mut text = format!("*{}*\n{}", ev.title, ev.body);
        if let Some(url) = &ev.url {
            text.push('\n');
            text.push_str(url);
        }
        let body = serde_json::json!({ "text": text });

        self.client
            .post(&self.webhook_url)
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
